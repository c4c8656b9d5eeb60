use rusqlite::types::ToSql;
use rusqlite::Connection;

use crate::db::{like_escape, placeholders};
use crate::error::Result;
use crate::store::{self, validate_category, validate_pattern};

/// Claims still-uncategorized rows only, so the first filter to run wins a row.
const APPLY_FILTER_SQL: &str = "UPDATE transactions SET category = ?1, filter_id = ?2 \
     WHERE category = '' AND description LIKE '%' || ?3 || '%' ESCAPE '\\'";

pub struct CategorizeResult {
    pub categorized: usize,
    pub still_uncategorized: usize,
}

/// Runs every filter, pattern descending, over uncategorized transactions.
///
/// Each filter is one atomic conditional UPDATE. The run as a whole is not a
/// transaction: a store error stops it with the earlier filters already applied.
pub fn apply_all_filters(conn: &Connection) -> Result<CategorizeResult> {
    let filters = store::all_filters(conn)?;
    let mut stmt = conn.prepare_cached(APPLY_FILTER_SQL)?;

    let mut categorized = 0usize;
    for filter in &filters {
        let hits = stmt.execute(rusqlite::params![
            filter.category,
            filter.id,
            like_escape(&filter.pattern)
        ])?;
        if hits > 0 {
            tracing::debug!(filter_id = filter.id, pattern = %filter.pattern, hits, "filter applied");
        }
        categorized += hits;
    }

    let still_uncategorized: i64 = conn.query_row(
        "SELECT count(*) FROM transactions WHERE category = ''",
        [],
        |row| row.get(0),
    )?;
    tracing::info!(filters = filters.len(), categorized, "applied all filters");

    Ok(CategorizeResult {
        categorized,
        still_uncategorized: still_uncategorized as usize,
    })
}

/// Categorizes uncategorized rows containing `pattern`. When a stored filter
/// matches the pair its id is recorded, otherwise `filter_id` stays NULL.
pub fn apply_single_filter(conn: &Connection, category: &str, pattern: &str) -> Result<usize> {
    validate_category(category)?;
    validate_pattern(pattern)?;
    let filter_id = store::find_filter(conn, category, pattern)?.map(|f| f.id);
    let hits = conn.execute(
        APPLY_FILTER_SQL,
        rusqlite::params![category, filter_id, like_escape(pattern)],
    )?;
    tracing::info!(category, pattern, hits, "applied filter");
    Ok(hits)
}

pub fn reset_category(conn: &Connection, category: &str) -> Result<usize> {
    validate_category(category)?;
    let reset = conn.execute(
        "UPDATE transactions SET category = '', filter_id = NULL WHERE category = ?1",
        [category],
    )?;
    tracing::info!(category, reset, "reset category");
    Ok(reset)
}

pub fn reset_category_for_filter(conn: &Connection, filter_id: i64) -> Result<usize> {
    let reset = conn.execute(
        "UPDATE transactions SET category = '', filter_id = NULL WHERE filter_id = ?1",
        [filter_id],
    )?;
    tracing::info!(filter_id, reset, "reset filter rows");
    Ok(reset)
}

/// Manual categorization. The rows lose any filter link.
pub fn set_category(conn: &Connection, ids: &[i64], category: &str) -> Result<usize> {
    validate_category(category)?;
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "UPDATE transactions SET category = ?, filter_id = NULL WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut params: Vec<&dyn ToSql> = vec![&category as &dyn ToSql];
    params.extend(ids.iter().map(|id| id as &dyn ToSql));
    let updated = conn.execute(&sql, params.as_slice())?;
    tracing::info!(category, updated, "set category");
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Filter and category lifecycle
// ---------------------------------------------------------------------------

/// Deletes a filter and returns the rows it had classified to uncategorized.
pub fn delete_filter(conn: &mut Connection, filter_id: i64) -> Result<usize> {
    let tx = conn.transaction()?;
    store::get_filter(&tx, filter_id)?;
    let reset = reset_category_for_filter(&tx, filter_id)?;
    tx.execute("DELETE FROM filters WHERE id = ?1", [filter_id])?;
    tx.commit()?;
    Ok(reset)
}

pub struct DeleteCategoryResult {
    pub reset: usize,
    pub filters_deleted: usize,
}

/// Uncategorizes every row of `category` and drops its filters.
pub fn delete_category(conn: &mut Connection, category: &str) -> Result<DeleteCategoryResult> {
    validate_category(category)?;
    let tx = conn.transaction()?;
    let reset = reset_category(&tx, category)?;
    let filters_deleted = tx.execute("DELETE FROM filters WHERE category = ?1", [category])?;
    tx.commit()?;
    Ok(DeleteCategoryResult { reset, filters_deleted })
}

/// Renames a category on transactions and filters alike. Returns renamed rows.
pub fn rename_category(conn: &mut Connection, old_name: &str, new_name: &str) -> Result<usize> {
    validate_category(old_name)?;
    validate_category(new_name)?;
    if old_name == new_name {
        return Ok(0);
    }
    let tx = conn.transaction()?;
    let renamed = tx.execute(
        "UPDATE transactions SET category = ?1 WHERE category = ?2",
        [new_name, old_name],
    )?;
    tx.execute(
        "UPDATE filters SET category = ?1 WHERE category = ?2",
        [new_name, old_name],
    )?;
    tx.commit()?;
    tracing::info!(old_name, new_name, renamed, "renamed category");
    Ok(renamed)
}
