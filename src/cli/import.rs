use std::path::PathBuf;

use crate::categorizer::apply_all_filters;
use crate::cli::connect;
use crate::error::Result;
use crate::importer::{add_transaction, import_batch, parse_amount, parse_batch_csv, parse_date};
use crate::models::NewTransaction;

pub fn run(file: &str, bank: &str, no_categorize: bool) -> Result<()> {
    let rows = parse_batch_csv(&PathBuf::from(file))?;
    let (_, mut conn) = connect()?;

    let result = import_batch(&mut conn, bank, &rows)?;
    if result.inserted == 0 && result.ignored == 0 {
        println!("Nothing to import.");
        return Ok(());
    }
    if let (Some(min), Some(max)) = (result.min_date, result.max_date) {
        println!("{bank}: {min} to {max}");
    }
    println!(
        "{} imported, {} already known, {} superseded",
        result.inserted, result.ignored, result.superseded
    );

    if !no_categorize {
        let cat = apply_all_filters(&conn)?;
        println!(
            "{} categorized, {} still uncategorized",
            cat.categorized, cat.still_uncategorized
        );
    }
    Ok(())
}

pub fn add(
    bank: &str,
    date: &str,
    description: &str,
    amount: &str,
    category: Option<&str>,
    external_id: Option<String>,
) -> Result<()> {
    let row = NewTransaction {
        date: parse_date(date)?,
        description: description.to_string(),
        amount: parse_amount(amount)?,
        external_id,
    };
    let (_, conn) = connect()?;
    let id = add_transaction(&conn, bank, &row, category)?;
    println!("Added transaction {id}");
    Ok(())
}
