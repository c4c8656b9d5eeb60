use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::error::{Result, WmmError};
use crate::models::NewTransaction;
use crate::store::validate_category;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn parse_amount(raw: &str) -> Result<f64> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    let parsed = match s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        Some(inner) => inner.trim().parse::<f64>().map(|v| -v),
        None => s.parse::<f64>(),
    };
    parsed.map_err(|_| WmmError::InvalidAmount(raw.trim().to_string()))
}

/// Accepts `YYYY-MM-DD` and the US `MM/DD/YYYY` form.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .map_err(|_| WmmError::InvalidDate(raw.to_string()))
}

fn batch_checksum(rows: &[NewTransaction]) -> String {
    let mut hasher = Sha256::new();
    for row in rows {
        hasher.update(format!(
            "{}|{}|{}|{}\n",
            row.date,
            row.description,
            row.amount,
            row.external_id.as_deref().unwrap_or("")
        ));
    }
    hex::encode(hasher.finalize())
}

fn validate_row(row: &NewTransaction) -> Result<()> {
    if row.description.trim().is_empty() {
        return Err(WmmError::EmptyField("description"));
    }
    if !row.amount.is_finite() {
        return Err(WmmError::InvalidAmount(row.amount.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// import_batch
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct ImportResult {
    pub inserted: usize,
    /// Rows skipped because their external id was already stored.
    pub ignored: usize,
    /// Previously stored rows replaced by this batch.
    pub superseded: usize,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
}

/// Merges a batch for one bank.
///
/// Every stored row for `bank` dated on or after the batch's earliest date is
/// deleted and the whole batch is inserted, inside one transaction. Rows that
/// carry an external id are inserted with insert-or-ignore semantics on
/// `(bank, external_id)`.
pub fn import_batch(conn: &mut Connection, bank: &str, rows: &[NewTransaction]) -> Result<ImportResult> {
    if rows.is_empty() {
        return Ok(ImportResult::default());
    }
    if bank.trim().is_empty() {
        return Err(WmmError::EmptyField("bank"));
    }
    for row in rows {
        validate_row(row)?;
    }

    let mut batch = rows.to_vec();
    batch.sort_by_key(|r| r.date);
    let min_date = batch[0].date;
    let max_date = batch[batch.len() - 1].date;
    let checksum = batch_checksum(&batch);

    let tx = conn.transaction()?;
    let superseded = tx.execute(
        "DELETE FROM transactions WHERE bank = ?1 AND date >= ?2",
        rusqlite::params![bank, min_date],
    )?;

    let mut inserted = 0usize;
    let mut ignored = 0usize;
    {
        let mut plain = tx.prepare_cached(
            "INSERT INTO transactions (bank, date, description, amount) VALUES (?1, ?2, ?3, ?4)",
        )?;
        let mut keyed = tx.prepare_cached(
            "INSERT OR IGNORE INTO transactions (bank, date, description, amount, external_id) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for row in &batch {
            let n = match &row.external_id {
                Some(ext) => keyed.execute(rusqlite::params![
                    bank,
                    row.date,
                    row.description,
                    row.amount,
                    ext
                ])?,
                None => plain.execute(rusqlite::params![
                    bank,
                    row.date,
                    row.description,
                    row.amount
                ])?,
            };
            if n == 0 {
                ignored += 1;
            }
            inserted += n;
        }
    }

    tx.execute(
        "INSERT INTO imports (bank, record_count, inserted_count, date_range_start, date_range_end, checksum) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            bank,
            batch.len() as i64,
            inserted as i64,
            min_date,
            max_date,
            checksum
        ],
    )?;
    tx.commit()?;

    tracing::info!(bank, %min_date, %max_date, superseded, inserted, ignored, "imported batch");
    Ok(ImportResult {
        inserted,
        ignored,
        superseded,
        min_date: Some(min_date),
        max_date: Some(max_date),
    })
}

/// Inserts a single hand-entered transaction, optionally already categorized.
pub fn add_transaction(
    conn: &Connection,
    bank: &str,
    row: &NewTransaction,
    category: Option<&str>,
) -> Result<i64> {
    if bank.trim().is_empty() {
        return Err(WmmError::EmptyField("bank"));
    }
    validate_row(row)?;
    if let Some(category) = category {
        validate_category(category)?;
    }
    conn.execute(
        "INSERT INTO transactions (bank, date, description, amount, category, external_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            bank,
            row.date,
            row.description,
            row.amount,
            category.unwrap_or(""),
            row.external_id
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(id, bank, "added transaction");
    Ok(id)
}

// ---------------------------------------------------------------------------
// Batch CSV reader
// ---------------------------------------------------------------------------

fn column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// Reads a headered CSV with `date`, `description`, `amount` and an optional
/// `external_id` column.
pub fn parse_batch_csv(file_path: &Path) -> Result<Vec<NewTransaction>> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(std::io::BufReader::new(file));

    let headers = rdr.headers()?.clone();
    let idx_date = column(&headers, &["date", "posting date"]).ok_or(WmmError::EmptyField("date column"))?;
    let idx_desc = column(&headers, &["description", "payee"])
        .ok_or(WmmError::EmptyField("description column"))?;
    let idx_amount = column(&headers, &["amount"]).ok_or(WmmError::EmptyField("amount column"))?;
    let idx_ext = column(&headers, &["external_id", "transaction_id"]);

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let field = |i: usize| record.get(i).unwrap_or("");
        let external_id = idx_ext
            .map(field)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        rows.push(NewTransaction {
            date: parse_date(field(idx_date))?,
            description: field(idx_desc).to_string(),
            amount: parse_amount(field(idx_amount))?,
            external_id,
        });
    }
    tracing::debug!(path = %file_path.display(), rows = rows.len(), "parsed batch file");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn row(d: &str, desc: &str, amount: f64) -> NewTransaction {
        NewTransaction {
            date: date(d),
            description: desc.to_string(),
            amount,
            external_id: None,
        }
    }

    fn keyed(d: &str, desc: &str, amount: f64, ext: &str) -> NewTransaction {
        NewTransaction {
            external_id: Some(ext.to_string()),
            ..row(d, desc, amount)
        }
    }

    fn bank_rows(conn: &Connection, bank: &str) -> Vec<(String, String, String)> {
        conn.prepare(
            "SELECT date, description, category FROM transactions WHERE bank = ?1 ORDER BY date, id",
        )
        .unwrap()
        .query_map([bank], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
        .unwrap()
        .collect::<std::result::Result<Vec<_>, _>>()
        .unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,234.56").unwrap(), 1234.56);
        assert_eq!(parse_amount("\"500.00\"").unwrap(), 500.0);
        assert_eq!(parse_amount("  -42.50  ").unwrap(), -42.5);
        assert_eq!(parse_amount("(1,234.56)").unwrap(), -1234.56);
        assert_eq!(parse_amount("$12.00").unwrap(), 12.0);
        assert!(matches!(parse_amount("abc"), Err(WmmError::InvalidAmount(_))));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2025-01-15").unwrap(), date("2025-01-15"));
        assert_eq!(parse_date("01/15/2025").unwrap(), date("2025-01-15"));
        assert!(matches!(parse_date("02/30/2025"), Err(WmmError::InvalidDate(_))));
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let (_dir, mut conn) = test_db();
        let result = import_batch(&mut conn, "X", &[]).unwrap();
        assert_eq!(result.inserted, 0);
        let imports: i64 = conn.query_row("SELECT count(*) FROM imports", [], |r| r.get(0)).unwrap();
        assert_eq!(imports, 0);
    }

    #[test]
    fn test_import_sorts_and_inserts() {
        let (_dir, mut conn) = test_db();
        let result = import_batch(
            &mut conn,
            "X",
            &[row("2024-01-05", "B", -2.0), row("2024-01-01", "A", -1.0)],
        )
        .unwrap();
        assert_eq!(result.inserted, 2);
        assert_eq!(result.superseded, 0);
        assert_eq!(result.min_date, Some(date("2024-01-01")));
        assert_eq!(result.max_date, Some(date("2024-01-05")));
        let ids_in_order: Vec<String> = conn
            .prepare("SELECT description FROM transactions ORDER BY id")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(ids_in_order, vec!["A", "B"]);
    }

    #[test]
    fn test_reimport_replaces_window_only() {
        let (_dir, mut conn) = test_db();
        import_batch(
            &mut conn,
            "X",
            &[row("2024-01-01", "FIRST", -1.0), row("2024-01-05", "SECOND", -5.0)],
        )
        .unwrap();
        import_batch(&mut conn, "Y", &[row("2024-01-04", "OTHER BANK", -9.0)]).unwrap();

        let result = import_batch(
            &mut conn,
            "X",
            &[
                row("2024-01-05", "SECOND", -5.0),
                row("2024-01-03", "NEW THIRD", -3.0),
                row("2024-01-08", "NEW EIGHTH", -8.0),
            ],
        )
        .unwrap();
        assert_eq!(result.superseded, 1);
        assert_eq!(result.inserted, 3);

        let dates: Vec<String> = bank_rows(&conn, "X").into_iter().map(|r| r.0).collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-01-03", "2024-01-05", "2024-01-08"]);
        assert_eq!(bank_rows(&conn, "Y").len(), 1);
    }

    #[test]
    fn test_reimport_same_batch_is_idempotent() {
        let (_dir, mut conn) = test_db();
        let batch = [
            row("2024-02-01", "COFFEE", -3.0),
            row("2024-02-01", "COFFEE", -3.0),
            row("2024-02-02", "RENT", -900.0),
        ];
        import_batch(&mut conn, "X", &batch).unwrap();
        let first = bank_rows(&conn, "X");
        import_batch(&mut conn, "X", &batch).unwrap();
        assert_eq!(bank_rows(&conn, "X"), first);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_categorized_history_before_window_survives() {
        let (_dir, mut conn) = test_db();
        import_batch(&mut conn, "X", &[row("2024-01-01", "OLD", -1.0)]).unwrap();
        conn.execute("UPDATE transactions SET category = 'Dining'", []).unwrap();
        import_batch(&mut conn, "X", &[row("2024-01-02", "NEW", -1.0)]).unwrap();
        let rows = bank_rows(&conn, "X");
        assert_eq!(rows[0], ("2024-01-01".into(), "OLD".into(), "Dining".into()));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_external_id_insert_or_ignore() {
        let (_dir, mut conn) = test_db();
        import_batch(&mut conn, "X", &[keyed("2024-01-01", "A", -1.0, "ext-1")]).unwrap();
        let result = import_batch(
            &mut conn,
            "X",
            &[keyed("2024-01-01", "A", -1.0, "ext-1"), keyed("2024-01-02", "B", -2.0, "ext-2")],
        )
        .unwrap();
        assert_eq!(result.superseded, 1);
        assert_eq!(result.inserted, 2);

        // ext-1 now sits before the window: the delete keeps it, the insert skips it.
        let result = import_batch(
            &mut conn,
            "X",
            &[keyed("2024-01-03", "A again", -1.0, "ext-1"), keyed("2024-01-03", "C", -3.0, "ext-3")],
        )
        .unwrap();
        assert_eq!(result.inserted, 1);
        assert_eq!(result.ignored, 1);
        let descs: Vec<String> = bank_rows(&conn, "X").into_iter().map(|r| r.1).collect();
        assert_eq!(descs, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_failed_insert_rolls_back_delete() {
        let (_dir, mut conn) = test_db();
        import_batch(&mut conn, "X", &[row("2024-01-05", "KEEP ME", -5.0)]).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER fail_insert BEFORE INSERT ON transactions \
             WHEN NEW.description = 'BOOM' BEGIN SELECT RAISE(ABORT, 'boom'); END;",
        )
        .unwrap();

        let result = import_batch(
            &mut conn,
            "X",
            &[row("2024-01-01", "FINE", -1.0), row("2024-01-06", "BOOM", -1.0)],
        );
        assert!(matches!(result, Err(WmmError::Db(_))));
        let descs: Vec<String> = bank_rows(&conn, "X").into_iter().map(|r| r.1).collect();
        assert_eq!(descs, vec!["KEEP ME"]);
    }

    #[test]
    fn test_import_rejects_invalid_rows_before_store() {
        let (_dir, mut conn) = test_db();
        import_batch(&mut conn, "X", &[row("2024-01-05", "KEEP", -5.0)]).unwrap();
        let result = import_batch(&mut conn, "X", &[row("2024-01-01", "  ", -1.0)]);
        assert!(matches!(result, Err(WmmError::EmptyField("description"))));
        assert!(matches!(
            import_batch(&mut conn, "", &[row("2024-01-01", "A", -1.0)]),
            Err(WmmError::EmptyField("bank"))
        ));
        assert_eq!(bank_rows(&conn, "X").len(), 1);
    }

    #[test]
    fn test_import_records_batch() {
        let (_dir, mut conn) = test_db();
        import_batch(&mut conn, "X", &[row("2024-01-05", "A", -5.0), row("2024-01-07", "B", -1.0)]).unwrap();
        let (count, inserted, start, end, checksum): (i64, i64, String, String, String) = conn
            .query_row(
                "SELECT record_count, inserted_count, date_range_start, date_range_end, checksum FROM imports",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .unwrap();
        assert_eq!((count, inserted), (2, 2));
        assert_eq!((start.as_str(), end.as_str()), ("2024-01-05", "2024-01-07"));
        assert_eq!(checksum.len(), 64);
    }

    #[test]
    fn test_add_transaction() {
        let (_dir, conn) = test_db();
        let id = add_transaction(&conn, "Cash", &row("2024-03-01", "MARKET", -20.0), Some("Food")).unwrap();
        let category: String = conn
            .query_row("SELECT category FROM transactions WHERE id = ?1", [id], |r| r.get(0))
            .unwrap();
        assert_eq!(category, "Food");
        assert!(add_transaction(&conn, "", &row("2024-03-01", "X", 1.0), None).is_err());
    }

    #[test]
    fn test_parse_batch_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.csv");
        let content = "\
Date,Description,Amount,External_ID
2024-01-15,ADOBE CREATIVE,-50.00,tx-1
01/16/2024,\"STRIPE, PAYOUT\",\"2,500.00\",

2024-01-17,REFUND,(12.00),tx-3
";
        std::fs::write(&path, content).unwrap();
        let rows = parse_batch_csv(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].external_id.as_deref(), Some("tx-1"));
        assert_eq!(rows[1].description, "STRIPE, PAYOUT");
        assert_eq!(rows[1].date, date("2024-01-16"));
        assert_eq!(rows[1].amount, 2500.0);
        assert_eq!(rows[1].external_id, None);
        assert_eq!(rows[2].amount, -12.0);
    }

    #[test]
    fn test_parse_batch_csv_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.csv");
        std::fs::write(&path, "Date,Memo\n2024-01-01,X\n").unwrap();
        assert!(matches!(
            parse_batch_csv(&path),
            Err(WmmError::EmptyField("description column"))
        ));
    }
}
