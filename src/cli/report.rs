use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::connect;
use crate::cli::transactions::transaction_table;
use crate::cli::WindowArgs;
use crate::error::Result;
use crate::fmt::money;
use crate::models::Granularity;
use crate::reports::{self, CategoryBalance};
use crate::store::category_filters;

pub fn bank(bank: &str, window: &WindowArgs, json: bool) -> Result<()> {
    let (start, end) = window.resolve()?;
    let (settings, conn) = connect()?;
    let data = reports::bank_balance(&conn, bank, start, end)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Bank", "Balance", "First", "Latest"]);
    let dash = || "-".to_string();
    table.add_row(vec![
        Cell::new(&data.bank),
        Cell::new(money(data.balance, &settings.currency_symbol)),
        Cell::new(data.first_date.map_or_else(dash, |d| d.to_string())),
        Cell::new(data.latest_date.map_or_else(dash, |d| d.to_string())),
    ]);
    println!("Bank Balance ({start} to {end})\n{table}");
    Ok(())
}

fn balance_row(item: &CategoryBalance, currency: &str) -> Vec<Cell> {
    let label = match item.pattern.as_deref() {
        None => format!("{}", item.category.bold()),
        Some("") => "  (other)".to_string(),
        Some(p) => format!("  {p}"),
    };
    vec![
        Cell::new(label),
        Cell::new(money(item.balance, currency)),
        Cell::new(money(item.avg_monthly_balance, currency)),
        Cell::new(format!("{:.1}", item.avg_monthly_transactions)),
        Cell::new(item.months),
    ]
}

pub fn category(category: &str, pattern: Option<&str>, window: &WindowArgs, json: bool) -> Result<()> {
    let (start, end) = window.resolve()?;
    let (settings, conn) = connect()?;

    let items = match pattern {
        Some(p) => vec![reports::category_filter_balance(&conn, category, p, start, end)?],
        None => {
            let mut items = vec![reports::category_balance(&conn, category, start, end)?];
            for f in category_filters(&conn, category)? {
                items.push(reports::category_filter_balance(&conn, category, &f.pattern, start, end)?);
            }
            if items.len() > 1 {
                items.push(reports::category_non_filter_balance(&conn, category, start, end)?);
            }
            items
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Category", "Balance", "Avg / Month", "Txns / Month", "Months"]);
    for item in &items {
        table.add_row(balance_row(item, &settings.currency_symbol));
    }
    println!("Category Balance ({start} to {end})\n{table}");
    Ok(())
}

pub fn timeline(
    bank: Option<&str>,
    category: Option<&str>,
    granularity: &str,
    filters: &[String],
    window: &WindowArgs,
    json: bool,
) -> Result<()> {
    let granularity: Granularity = granularity.parse()?;
    let (start, end) = window.resolve()?;
    let (settings, conn) = connect()?;
    let currency = settings.currency_symbol.as_str();

    if let (Some(category), false) = (category, filters.is_empty()) {
        let points = reports::timeline_by_category_filters(&conn, category, filters, start, end)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&points)?);
            return Ok(());
        }
        let mut table = Table::new();
        table.set_header(vec!["Date", "Filter", "Amount"]);
        for p in &points {
            table.add_row(vec![
                Cell::new(p.period),
                Cell::new(&p.pattern),
                Cell::new(money(p.amount, currency)),
            ]);
        }
        println!("{category} by filter\n{table}");
        return Ok(());
    }

    let (title, points) = match (bank, category) {
        (Some(bank), _) => (bank, reports::timeline_by_bank(&conn, bank, granularity, start, end)?),
        (None, Some(category)) => (
            category,
            reports::timeline_by_category(&conn, category, granularity, start, end)?,
        ),
        (None, None) => return Ok(()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Period", "Amount", "Count"]);
    for p in &points {
        let amount = money(p.total_amount, currency);
        let amount = if p.total_amount < 0.0 { amount.red() } else { amount.green() };
        table.add_row(vec![
            Cell::new(p.period),
            Cell::new(amount),
            Cell::new(p.transaction_count),
        ]);
    }
    println!("{title} by {granularity}\n{table}");
    Ok(())
}

pub fn residual(category: &str, window: &WindowArgs, json: bool) -> Result<()> {
    let (start, end) = window.resolve()?;
    let (settings, conn) = connect()?;
    let balance = reports::category_non_filter_balance(&conn, category, start, end)?;
    let rows = reports::category_non_filter_transactions(&conn, category, start, end)?;

    if json {
        let out = serde_json::json!({ "balance": balance, "transactions": rows });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Category", "Balance", "Avg / Month", "Txns / Month", "Months"]);
    table.add_row(balance_row(&balance, &settings.currency_symbol));
    println!("{category} outside its filters ({start} to {end})\n{table}");
    if !rows.is_empty() {
        println!("{}", transaction_table(&rows, &settings.currency_symbol));
    }
    Ok(())
}
