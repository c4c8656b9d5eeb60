use crate::categorizer::{
    apply_all_filters, apply_single_filter, reset_category, reset_category_for_filter, set_category,
};
use crate::cli::connect;
use crate::error::Result;
use crate::store::{get_filter, get_transaction};

pub fn run(category: Option<&str>, pattern: Option<&str>) -> Result<()> {
    let (_, conn) = connect()?;
    match (category, pattern) {
        (Some(category), Some(pattern)) => {
            let n = apply_single_filter(&conn, category, pattern)?;
            println!("{n} categorized as {category}");
        }
        _ => {
            let result = apply_all_filters(&conn)?;
            println!(
                "{} categorized, {} still uncategorized",
                result.categorized, result.still_uncategorized
            );
        }
    }
    Ok(())
}

pub fn reset(category: Option<&str>, filter: Option<i64>) -> Result<()> {
    let (_, conn) = connect()?;
    let n = match (category, filter) {
        (_, Some(id)) => {
            let f = get_filter(&conn, id)?;
            let n = reset_category_for_filter(&conn, id)?;
            println!("Reset {n} transactions classified by '{}'", f.display_name());
            n
        }
        (Some(category), None) => {
            let n = reset_category(&conn, category)?;
            println!("Reset {n} transactions from {category}");
            n
        }
        (None, None) => 0,
    };
    tracing::debug!(reset = n, "reset finished");
    Ok(())
}

pub fn set(ids: &[i64], category: &str) -> Result<()> {
    let (_, conn) = connect()?;
    let mut missing = Vec::new();
    for &id in ids {
        if get_transaction(&conn, id)?.is_none() {
            missing.push(id);
        }
    }
    if !missing.is_empty() {
        tracing::warn!(?missing, "unknown transaction ids");
    }
    let n = set_category(&conn, ids, category)?;
    println!("{n} transactions set to {category}");
    Ok(())
}
