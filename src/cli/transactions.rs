use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{connect, parse_date_opt};
use crate::error::Result;
use crate::fmt::money;
use crate::models::Transaction;
use crate::store::{bank_names, list_transactions, years, TransactionQuery};

/// Transactions as a table, newest first. Shared with duplicate and residual listings.
pub(crate) fn transaction_table(rows: &[Transaction], currency: &str) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Bank", "Date", "Description", "Amount", "Category"]);
    for t in rows {
        let amount = money(t.amount, currency);
        let amount = if t.amount < 0.0 {
            amount.red()
        } else {
            amount.green()
        };
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.bank),
            Cell::new(t.date),
            Cell::new(&t.description),
            Cell::new(amount),
            Cell::new(if t.is_categorized() { t.category.as_str() } else { "-" }),
        ]);
    }
    table
}

pub fn list(
    bank: Option<String>,
    category: Option<String>,
    pattern: Option<String>,
    from_date: Option<String>,
    to_date: Option<String>,
    json: bool,
) -> Result<()> {
    let query = TransactionQuery {
        bank,
        start: parse_date_opt(&from_date)?,
        end: parse_date_opt(&to_date)?,
        category,
        pattern,
    };
    let (settings, conn) = connect()?;
    let rows = list_transactions(&conn, &query)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("{}", transaction_table(&rows, &settings.currency_symbol));
        println!("{} transactions", rows.len());
    }
    Ok(())
}

pub fn banks() -> Result<()> {
    let (_, conn) = connect()?;
    for bank in bank_names(&conn)? {
        println!("{bank}");
    }
    Ok(())
}

pub fn list_years() -> Result<()> {
    let (_, conn) = connect()?;
    for year in years(&conn)? {
        println!("{year}");
    }
    Ok(())
}
