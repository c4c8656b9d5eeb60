use chrono::NaiveDate;
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::db::like_escape;
use crate::error::{Result, WmmError};
use crate::models::{Filter, Transaction};

/// Upper bound for category names and filter patterns.
pub const MAX_TEXT_LEN: usize = 200;

pub const TXN_COLUMNS: &str =
    "id, bank, date, description, amount, category, filter_id, external_id, not_duplicate";

pub fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        bank: row.get(1)?,
        date: row.get(2)?,
        description: row.get(3)?,
        amount: row.get(4)?,
        category: row.get(5)?,
        filter_id: row.get(6)?,
        external_id: row.get(7)?,
        not_duplicate: row.get(8)?,
    })
}

fn row_to_filter(row: &Row) -> rusqlite::Result<Filter> {
    Ok(Filter {
        id: row.get(0)?,
        category: row.get(1)?,
        pattern: row.get(2)?,
        label: row.get(3)?,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate_category(category: &str) -> Result<()> {
    if category.trim().is_empty() {
        return Err(WmmError::EmptyField("category"));
    }
    if category.chars().count() > MAX_TEXT_LEN {
        return Err(WmmError::TooLong { field: "category", max: MAX_TEXT_LEN });
    }
    Ok(())
}

pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.is_empty() {
        return Err(WmmError::EmptyPattern);
    }
    if pattern.chars().count() > MAX_TEXT_LEN {
        return Err(WmmError::TooLong { field: "pattern", max: MAX_TEXT_LEN });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct TransactionQuery {
    pub bank: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub category: Option<String>,
    /// Description contains this text.
    pub pattern: Option<String>,
}

pub fn list_transactions(conn: &Connection, query: &TransactionQuery) -> Result<Vec<Transaction>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(bank) = &query.bank {
        clauses.push("bank = ?");
        params.push(Box::new(bank.clone()));
    }
    if let Some(start) = query.start {
        clauses.push("date >= ?");
        params.push(Box::new(start));
    }
    if let Some(end) = query.end {
        clauses.push("date <= ?");
        params.push(Box::new(end));
    }
    if let Some(category) = &query.category {
        clauses.push("category = ?");
        params.push(Box::new(category.clone()));
    }
    if let Some(pattern) = &query.pattern {
        clauses.push("description LIKE '%' || ? || '%' ESCAPE '\\'");
        params.push(Box::new(like_escape(pattern)));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {TXN_COLUMNS} FROM transactions{where_clause} ORDER BY date DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_values: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_values.as_slice(), row_to_transaction)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    let sql = format!("SELECT {TXN_COLUMNS} FROM transactions WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], row_to_transaction).optional()?)
}

pub fn bank_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT bank FROM transactions ORDER BY bank")?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Categories in use by transactions or declared by filters.
pub fn category_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT category FROM transactions WHERE category != '' \
         UNION SELECT category FROM filters ORDER BY category ASC",
    )?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn years(conn: &Connection) -> Result<Vec<i32>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT CAST(substr(date, 1, 4) AS INTEGER) AS year FROM transactions ORDER BY year",
    )?;
    let rows = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// All filters in classification order: pattern descending, ignoring ASCII
/// case the same way `LIKE` matching does.
pub fn all_filters(conn: &Connection) -> Result<Vec<Filter>> {
    let mut stmt = conn.prepare(
        "SELECT id, category, pattern, label FROM filters \
         ORDER BY pattern COLLATE NOCASE DESC, pattern DESC, id ASC",
    )?;
    let rows = stmt
        .query_map([], row_to_filter)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn category_filters(conn: &Connection, category: &str) -> Result<Vec<Filter>> {
    let mut stmt = conn.prepare(
        "SELECT id, category, pattern, label FROM filters WHERE category = ?1 \
         ORDER BY CASE WHEN label = '' THEN pattern ELSE label END ASC, id ASC",
    )?;
    let rows = stmt
        .query_map([category], row_to_filter)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_filter(conn: &Connection, id: i64) -> Result<Filter> {
    conn.query_row(
        "SELECT id, category, pattern, label FROM filters WHERE id = ?1",
        [id],
        row_to_filter,
    )
    .optional()?
    .ok_or(WmmError::UnknownFilter(id))
}

pub fn find_filter(conn: &Connection, category: &str, pattern: &str) -> Result<Option<Filter>> {
    Ok(conn
        .query_row(
            "SELECT id, category, pattern, label FROM filters \
             WHERE category = ?1 AND pattern = ?2 ORDER BY id LIMIT 1",
            [category, pattern],
            row_to_filter,
        )
        .optional()?)
}

pub fn add_filter(conn: &Connection, category: &str, pattern: &str, label: Option<&str>) -> Result<Filter> {
    validate_category(category)?;
    validate_pattern(pattern)?;
    let label = label.unwrap_or("");
    conn.execute(
        "INSERT INTO filters (category, pattern, label) VALUES (?1, ?2, ?3)",
        [category, pattern, label],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(id, category, pattern, "added filter");
    Ok(Filter {
        id,
        category: category.to_string(),
        pattern: pattern.to_string(),
        label: label.to_string(),
    })
}

/// Edits a filter in place. Rows it already classified keep their category.
pub fn update_filter(conn: &Connection, id: i64, pattern: &str, label: Option<&str>) -> Result<Filter> {
    validate_pattern(pattern)?;
    let changed = conn.execute(
        "UPDATE filters SET pattern = ?1, label = ?2 WHERE id = ?3",
        rusqlite::params![pattern, label.unwrap_or(""), id],
    )?;
    if changed == 0 {
        return Err(WmmError::UnknownFilter(id));
    }
    get_filter(conn, id)
}
