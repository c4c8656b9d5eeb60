use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::db::placeholders;
use crate::error::Result;
use crate::models::Transaction;
use crate::store::{row_to_transaction, TXN_COLUMNS};

/// Every transaction sharing (bank, date, description, amount) with another
/// row, where neither side has been confirmed as not a duplicate.
pub fn find_duplicates(conn: &Connection) -> Result<Vec<Transaction>> {
    let sql = format!(
        "SELECT {TXN_COLUMNS} FROM transactions t1 \
         WHERE t1.not_duplicate = 0 AND EXISTS ( \
             SELECT 1 FROM transactions t2 \
             WHERE t2.bank = t1.bank \
               AND t2.date = t1.date \
               AND t2.description = t1.description \
               AND t2.amount = t1.amount \
               AND t2.id <> t1.id \
               AND t2.not_duplicate = 0 \
         ) \
         ORDER BY t1.bank ASC, t1.date DESC, t1.id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], row_to_transaction)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    tracing::debug!(count = rows.len(), "found duplicates");
    Ok(rows)
}

/// Confirms rows as distinct. There is no way back.
pub fn mark_not_duplicate(conn: &Connection, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "UPDATE transactions SET not_duplicate = 1 WHERE id IN ({})",
        placeholders(ids.len())
    );
    let params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
    let marked = conn.execute(&sql, params.as_slice())?;
    tracing::info!(marked, "marked transactions as not duplicate");
    Ok(marked)
}

pub fn delete_transactions(conn: &Connection, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "DELETE FROM transactions WHERE id IN ({})",
        placeholders(ids.len())
    );
    let params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
    let deleted = conn.execute(&sql, params.as_slice())?;
    tracing::info!(deleted, "deleted transactions");
    Ok(deleted)
}
