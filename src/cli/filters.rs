use comfy_table::{Cell, Table};

use crate::categorizer::{apply_single_filter, delete_filter};
use crate::cli::connect;
use crate::error::Result;
use crate::store::{add_filter, all_filters, category_filters, get_filter, update_filter};

pub fn add(pattern: &str, category: &str, label: Option<&str>, no_apply: bool) -> Result<()> {
    let (_, conn) = connect()?;
    let filter = add_filter(&conn, category, pattern, label)?;
    println!("Added filter {}: '{}' \u{2192} {}", filter.id, filter.pattern, filter.category);

    if !no_apply {
        let n = apply_single_filter(&conn, category, pattern)?;
        println!("{n} categorized");
    }
    Ok(())
}

pub fn list(category: Option<&str>) -> Result<()> {
    let (_, conn) = connect()?;
    let filters = match category {
        Some(c) => category_filters(&conn, c)?,
        None => all_filters(&conn)?,
    };

    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Label", "Category"]);
    for f in &filters {
        table.add_row(vec![
            Cell::new(f.id),
            Cell::new(&f.pattern),
            Cell::new(&f.label),
            Cell::new(&f.category),
        ]);
    }
    println!("Filters\n{table}");
    Ok(())
}

/// Omitted fields keep their current value.
pub fn update(id: i64, pattern: Option<&str>, label: Option<&str>) -> Result<()> {
    let (_, conn) = connect()?;
    let current = get_filter(&conn, id)?;
    let pattern = pattern.unwrap_or(&current.pattern);
    let label = label.unwrap_or(&current.label);
    let updated = update_filter(&conn, id, pattern, Some(label))?;
    println!("Updated filter {}: '{}' \u{2192} {}", updated.id, updated.pattern, updated.category);
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let (_, mut conn) = connect()?;
    let filter = get_filter(&conn, id)?;
    let reset = delete_filter(&mut conn, id)?;
    println!(
        "Deleted filter {id}: '{}' \u{2192} {} ({reset} transactions uncategorized)",
        filter.pattern, filter.category
    );
    Ok(())
}
