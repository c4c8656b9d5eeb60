use crate::cli::connect;
use crate::cli::transactions::transaction_table;
use crate::duplicates::{delete_transactions, find_duplicates, mark_not_duplicate};
use crate::error::Result;

pub fn list(json: bool) -> Result<()> {
    let (settings, conn) = connect()?;
    let rows = find_duplicates(&conn)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if rows.is_empty() {
        println!("No duplicates found.");
    } else {
        println!("Possible duplicates\n{}", transaction_table(&rows, &settings.currency_symbol));
    }
    Ok(())
}

pub fn dismiss(ids: &[i64]) -> Result<()> {
    let (_, conn) = connect()?;
    let n = mark_not_duplicate(&conn, ids)?;
    println!("{n} transactions marked as not duplicate");
    Ok(())
}

pub fn delete(ids: &[i64]) -> Result<()> {
    let (_, conn) = connect()?;
    let n = delete_transactions(&conn, ids)?;
    println!("{n} transactions deleted");
    Ok(())
}
