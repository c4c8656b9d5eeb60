use chrono::{Datelike, NaiveDate};
use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::{like_escape, placeholders};
use crate::error::{Result, WmmError};
use crate::models::{Granularity, Period, Transaction};
use crate::store::{self, row_to_transaction, validate_category, validate_pattern, TXN_COLUMNS};

// ---------------------------------------------------------------------------
// Date window helper
// ---------------------------------------------------------------------------

/// Resolves CLI-style window options to an inclusive `[start, end]` range.
/// Explicit bounds win, then year+month, then year, then the current year.
pub fn resolve_window(
    year: Option<i32>,
    month: Option<u32>,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate)> {
    match (from_date, to_date) {
        (Some(from), Some(to)) => return Ok((from, to)),
        (Some(_), None) => {
            return Err(WmmError::InvalidDate(
                "--from requires --to (both date boundaries must be specified)".to_string(),
            ));
        }
        (None, Some(_)) => {
            return Err(WmmError::InvalidDate(
                "--to requires --from (both date boundaries must be specified)".to_string(),
            ));
        }
        (None, None) => {}
    }
    let y = year.unwrap_or_else(|| chrono::Local::now().year());
    let bad = || WmmError::InvalidDate(format!("{y:04}-{:02}", month.unwrap_or(1)));
    match month {
        Some(m) => {
            let start = NaiveDate::from_ymd_opt(y, m, 1).ok_or_else(bad)?;
            let next = if m == 12 {
                NaiveDate::from_ymd_opt(y + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(y, m + 1, 1)
            }
            .ok_or_else(bad)?;
            Ok((start, next.pred_opt().ok_or_else(bad)?))
        }
        None => Ok((
            NaiveDate::from_ymd_opt(y, 1, 1).ok_or_else(bad)?,
            NaiveDate::from_ymd_opt(y, 12, 31).ok_or_else(bad)?,
        )),
    }
}

// ---------------------------------------------------------------------------
// Bank balance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankBalance {
    pub bank: String,
    pub balance: f64,
    pub first_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
}

pub fn bank_balance(conn: &Connection, bank: &str, start: NaiveDate, end: NaiveDate) -> Result<BankBalance> {
    let (balance, first_date, latest_date) = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0), MIN(date), MAX(date) FROM transactions \
         WHERE bank = ?1 AND date >= ?2 AND date <= ?3",
        rusqlite::params![bank, start, end],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    Ok(BankBalance {
        bank: bank.to_string(),
        balance,
        first_date,
        latest_date,
    })
}

// ---------------------------------------------------------------------------
// Category balances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBalance {
    pub category: String,
    /// The filter pattern the balance is restricted to; empty for the residual
    /// balance outside every filter.
    pub pattern: Option<String>,
    pub balance: f64,
    pub avg_monthly_balance: f64,
    pub avg_monthly_transactions: f64,
    /// Number of (year, month) buckets holding at least one row.
    pub months: usize,
}

/// Sums per (year, month) bucket, then averages the bucket sums and counts.
fn monthly_balance(
    conn: &Connection,
    join: &str,
    clause: &str,
    params: &[&dyn ToSql],
) -> Result<(f64, f64, f64, usize)> {
    let sql = format!(
        "WITH buckets AS ( \
             SELECT SUM(t.amount) AS total, COUNT(*) AS n \
             FROM transactions t {join} \
             WHERE {clause} \
             GROUP BY substr(t.date, 1, 7) \
         ) \
         SELECT COALESCE(SUM(total), 0), COALESCE(AVG(total), 0), COALESCE(AVG(n), 0), COUNT(*) \
         FROM buckets"
    );
    let row = conn.query_row(&sql, params, |row| {
        Ok((
            row.get::<_, f64>(0)?,
            row.get::<_, f64>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;
    Ok((row.0, row.1, row.2, row.3 as usize))
}

pub fn category_balance(
    conn: &Connection,
    category: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<CategoryBalance> {
    validate_category(category)?;
    let (balance, avg_monthly_balance, avg_monthly_transactions, months) = monthly_balance(
        conn,
        "",
        "t.category = ? AND t.date >= ? AND t.date <= ?",
        &[&category as &dyn ToSql, &start, &end],
    )?;
    Ok(CategoryBalance {
        category: category.to_string(),
        pattern: None,
        balance,
        avg_monthly_balance,
        avg_monthly_transactions,
        months,
    })
}

/// Balance of the rows a given filter of `category` classified.
pub fn category_filter_balance(
    conn: &Connection,
    category: &str,
    pattern: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<CategoryBalance> {
    validate_category(category)?;
    validate_pattern(pattern)?;
    let (balance, avg_monthly_balance, avg_monthly_transactions, months) = monthly_balance(
        conn,
        "JOIN filters f ON t.filter_id = f.id",
        "t.category = ? AND f.pattern = ? AND t.date >= ? AND t.date <= ?",
        &[&category as &dyn ToSql, &pattern, &start, &end],
    )?;
    Ok(CategoryBalance {
        category: category.to_string(),
        pattern: Some(pattern.to_string()),
        balance,
        avg_monthly_balance,
        avg_monthly_transactions,
        months,
    })
}

/// WHERE clause and escaped patterns selecting rows of `category` that no
/// filter of that category matches by description.
fn residual_clause(conn: &Connection, category: &str) -> Result<(String, Vec<String>)> {
    let patterns: Vec<String> = store::category_filters(conn, category)?
        .into_iter()
        .map(|f| like_escape(&f.pattern))
        .collect();
    let mut clause = String::from("t.category = ? AND t.date >= ? AND t.date <= ?");
    for _ in &patterns {
        clause.push_str(" AND t.description NOT LIKE '%' || ? || '%' ESCAPE '\\'");
    }
    Ok((clause, patterns))
}

/// Balance of the rows in `category` not explained by any of its filters.
pub fn category_non_filter_balance(
    conn: &Connection,
    category: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<CategoryBalance> {
    validate_category(category)?;
    let (clause, patterns) = residual_clause(conn, category)?;
    let mut params: Vec<&dyn ToSql> = vec![&category as &dyn ToSql, &start, &end];
    params.extend(patterns.iter().map(|p| p as &dyn ToSql));
    let (balance, avg_monthly_balance, avg_monthly_transactions, months) =
        monthly_balance(conn, "", &clause, &params)?;
    Ok(CategoryBalance {
        category: category.to_string(),
        pattern: Some(String::new()),
        balance,
        avg_monthly_balance,
        avg_monthly_transactions,
        months,
    })
}

/// The rows behind `category_non_filter_balance`, oldest first.
pub fn category_non_filter_transactions(
    conn: &Connection,
    category: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Transaction>> {
    validate_category(category)?;
    let (clause, patterns) = residual_clause(conn, category)?;
    let mut params: Vec<&dyn ToSql> = vec![&category as &dyn ToSql, &start, &end];
    params.extend(patterns.iter().map(|p| p as &dyn ToSql));
    let sql = format!("SELECT {TXN_COLUMNS} FROM transactions t WHERE {clause} ORDER BY t.date, t.id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params.as_slice(), row_to_transaction)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Timelines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub period: Period,
    pub total_amount: f64,
    pub transaction_count: i64,
}

#[derive(Clone, Copy)]
enum Scope {
    Bank,
    Category,
}

impl Scope {
    fn column(self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Category => "category",
        }
    }
}

fn timeline(
    conn: &Connection,
    scope: Scope,
    value: &str,
    granularity: Granularity,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TimelinePoint>> {
    let column = scope.column();
    let prefix_len = match granularity {
        Granularity::Year => 4,
        Granularity::Month => 7,
        Granularity::Day => 10,
        Granularity::Unit => {
            let sql = format!(
                "SELECT date, amount FROM transactions \
                 WHERE {column} = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date, id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let points = stmt
                .query_map(rusqlite::params![value, start, end], |row| {
                    Ok(TimelinePoint {
                        period: Period::Day(row.get(0)?),
                        total_amount: row.get(1)?,
                        transaction_count: 1,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            return Ok(points);
        }
    };

    let sql = format!(
        "SELECT MIN(date), SUM(amount), COUNT(*) FROM transactions \
         WHERE {column} = ?1 AND date >= ?2 AND date <= ?3 \
         GROUP BY substr(date, 1, ?4) ORDER BY MIN(date)"
    );
    let mut stmt = conn.prepare(&sql)?;
    let points = stmt
        .query_map(rusqlite::params![value, start, end, prefix_len], |row| {
            let first: NaiveDate = row.get(0)?;
            Ok(TimelinePoint {
                period: Period::of(first, granularity),
                total_amount: row.get(1)?,
                transaction_count: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(points)
}

pub fn timeline_by_bank(
    conn: &Connection,
    bank: &str,
    granularity: Granularity,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TimelinePoint>> {
    timeline(conn, Scope::Bank, bank, granularity, start, end)
}

pub fn timeline_by_category(
    conn: &Connection,
    category: &str,
    granularity: Granularity,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<TimelinePoint>> {
    validate_category(category)?;
    timeline(conn, Scope::Category, category, granularity, start, end)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterTimelinePoint {
    pub pattern: String,
    pub period: Period,
    pub amount: f64,
}

/// Per-transaction points for rows classified by the given filters of `category`.
pub fn timeline_by_category_filters(
    conn: &Connection,
    category: &str,
    patterns: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<FilterTimelinePoint>> {
    validate_category(category)?;
    for p in patterns {
        validate_pattern(p)?;
    }
    if patterns.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT f.pattern, t.date, t.amount FROM transactions t \
         JOIN filters f ON t.filter_id = f.id \
         WHERE f.category = ? AND f.pattern IN ({}) AND t.date >= ? AND t.date <= ? \
         ORDER BY t.date, t.id",
        placeholders(patterns.len())
    );
    let mut params: Vec<&dyn ToSql> = vec![&category as &dyn ToSql];
    params.extend(patterns.iter().map(|p| p as &dyn ToSql));
    params.push(&start);
    params.push(&end);
    let mut stmt = conn.prepare(&sql)?;
    let points = stmt
        .query_map(params.as_slice(), |row| {
            Ok(FilterTimelinePoint {
                pattern: row.get(0)?,
                period: Period::Day(row.get(1)?),
                amount: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorizer::apply_all_filters;
    use crate::db::test_db;
    use crate::store::add_filter;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn insert(conn: &Connection, bank: &str, d: &str, desc: &str, amount: f64, category: &str) {
        conn.execute(
            "INSERT INTO transactions (bank, date, description, amount, category) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![bank, d, desc, amount, category],
        )
        .unwrap();
    }

    fn year_2024() -> (NaiveDate, NaiveDate) {
        (date("2024-01-01"), date("2024-12-31"))
    }

    #[test]
    fn test_resolve_window() {
        assert_eq!(
            resolve_window(Some(2024), Some(2), None, None).unwrap(),
            (date("2024-02-01"), date("2024-02-29"))
        );
        assert_eq!(
            resolve_window(Some(2023), Some(12), None, None).unwrap(),
            (date("2023-12-01"), date("2023-12-31"))
        );
        assert_eq!(
            resolve_window(Some(2024), None, None, None).unwrap(),
            (date("2024-01-01"), date("2024-12-31"))
        );
        assert_eq!(
            resolve_window(Some(2020), None, Some(date("2024-01-03")), Some(date("2024-01-09"))).unwrap(),
            (date("2024-01-03"), date("2024-01-09"))
        );
        assert!(resolve_window(Some(2024), Some(13), None, None).is_err());
    }

    #[test]
    fn test_resolve_window_rejects_half_open_range() {
        let msg = resolve_window(None, None, Some(date("2024-01-01")), None)
            .unwrap_err()
            .to_string();
        assert!(msg.contains("--from requires --to"), "got: {msg}");
        let msg = resolve_window(None, None, None, Some(date("2024-01-01")))
            .unwrap_err()
            .to_string();
        assert!(msg.contains("--to requires --from"), "got: {msg}");
    }

    #[test]
    fn test_bank_balance() {
        let (_dir, conn) = test_db();
        insert(&conn, "X", "2023-12-31", "OUTSIDE", 1000.0, "");
        insert(&conn, "X", "2024-01-10", "A", 100.0, "");
        insert(&conn, "X", "2024-03-05", "B", -40.0, "");
        insert(&conn, "Y", "2024-02-01", "C", 7.0, "");
        let (start, end) = year_2024();
        let b = bank_balance(&conn, "X", start, end).unwrap();
        assert_eq!(b.balance, 60.0);
        assert_eq!(b.first_date, Some(date("2024-01-10")));
        assert_eq!(b.latest_date, Some(date("2024-03-05")));
    }

    #[test]
    fn test_bank_balance_empty_window() {
        let (_dir, conn) = test_db();
        let (start, end) = year_2024();
        let b = bank_balance(&conn, "Nobody", start, end).unwrap();
        assert_eq!(b.balance, 0.0);
        assert_eq!(b.first_date, None);
        assert_eq!(b.latest_date, None);
    }

    #[test]
    fn test_category_balance_single_month() {
        let (_dir, conn) = test_db();
        insert(&conn, "X", "2024-05-01", "A", 10.0, "Food");
        insert(&conn, "X", "2024-05-10", "B", 20.0, "Food");
        insert(&conn, "Y", "2024-05-20", "C", 30.0, "Food");
        insert(&conn, "Y", "2024-05-20", "D", 99.0, "Other");
        let (start, end) = year_2024();
        let b = category_balance(&conn, "Food", start, end).unwrap();
        assert_eq!(b.balance, 60.0);
        assert_eq!(b.avg_monthly_balance, 60.0);
        assert_eq!(b.avg_monthly_transactions, 3.0);
        assert_eq!(b.months, 1);
    }

    #[test]
    fn test_category_balance_averages_across_months() {
        let (_dir, conn) = test_db();
        insert(&conn, "X", "2024-01-05", "A", -10.0, "Food");
        insert(&conn, "X", "2024-01-15", "B", -20.0, "Food");
        insert(&conn, "X", "2024-03-01", "C", -60.0, "Food");
        insert(&conn, "X", "2023-03-01", "SAME MONTH OTHER YEAR", -1000.0, "Food");
        let (start, end) = year_2024();
        let b = category_balance(&conn, "Food", start, end).unwrap();
        assert_eq!(b.balance, -90.0);
        assert_eq!(b.avg_monthly_balance, -45.0);
        assert_eq!(b.avg_monthly_transactions, 1.5);
        assert_eq!(b.months, 2);
    }

    #[test]
    fn test_category_balance_empty() {
        let (_dir, conn) = test_db();
        let (start, end) = year_2024();
        let b = category_balance(&conn, "Food", start, end).unwrap();
        assert_eq!((b.balance, b.avg_monthly_balance, b.avg_monthly_transactions, b.months), (0.0, 0.0, 0.0, 0));
    }

    #[test]
    fn test_category_filter_balance_uses_filter_link() {
        let (_dir, conn) = test_db();
        add_filter(&conn, "Utilities", "ELECTRIC", None).unwrap();
        add_filter(&conn, "Utilities", "WATER", None).unwrap();
        insert(&conn, "X", "2024-01-03", "ELECTRIC CO", -50.0, "");
        insert(&conn, "X", "2024-02-03", "ELECTRIC CO", -70.0, "");
        insert(&conn, "X", "2024-01-04", "WATER DEPT", -20.0, "");
        insert(&conn, "X", "2024-01-05", "ELECTRIC MANUAL", -5.0, "Utilities");
        apply_all_filters(&conn).unwrap();

        let (start, end) = year_2024();
        let b = category_filter_balance(&conn, "Utilities", "ELECTRIC", start, end).unwrap();
        assert_eq!(b.balance, -120.0);
        assert_eq!(b.avg_monthly_balance, -60.0);
        assert_eq!(b.months, 2);
        assert_eq!(b.pattern.as_deref(), Some("ELECTRIC"));
    }

    #[test]
    fn test_category_non_filter_balance() {
        let (_dir, conn) = test_db();
        add_filter(&conn, "Utilities", "ELECTRIC", None).unwrap();
        add_filter(&conn, "Utilities", "WATER", None).unwrap();
        insert(&conn, "X", "2024-01-03", "ELECTRIC CO", -50.0, "Utilities");
        insert(&conn, "X", "2024-01-04", "city water", -20.0, "Utilities");
        insert(&conn, "X", "2024-01-05", "GAS COMPANY", -30.0, "Utilities");
        insert(&conn, "X", "2024-02-05", "TRASH PICKUP", -10.0, "Utilities");
        insert(&conn, "X", "2024-02-05", "GAS STATION", -99.0, "Car");

        let (start, end) = year_2024();
        let b = category_non_filter_balance(&conn, "Utilities", start, end).unwrap();
        assert_eq!(b.balance, -40.0);
        assert_eq!(b.months, 2);

        let rows = category_non_filter_transactions(&conn, "Utilities", start, end).unwrap();
        let descs: Vec<&str> = rows.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(descs, vec!["GAS COMPANY", "TRASH PICKUP"]);
    }

    #[test]
    fn test_category_non_filter_balance_without_filters() {
        let (_dir, conn) = test_db();
        insert(&conn, "X", "2024-01-03", "A", -50.0, "Misc");
        insert(&conn, "X", "2024-01-04", "B", -20.0, "Misc");
        let (start, end) = year_2024();
        let residual = category_non_filter_balance(&conn, "Misc", start, end).unwrap();
        let plain = category_balance(&conn, "Misc", start, end).unwrap();
        assert_eq!(residual.balance, plain.balance);
        assert_eq!(residual.avg_monthly_transactions, plain.avg_monthly_transactions);
    }

    #[test]
    fn test_timeline_granularities() {
        let (_dir, conn) = test_db();
        insert(&conn, "X", "2023-12-31", "A", 1.0, "");
        insert(&conn, "X", "2024-01-01", "B", 2.0, "");
        insert(&conn, "X", "2024-01-01", "C", 3.0, "");
        insert(&conn, "X", "2024-02-15", "D", 4.0, "");
        insert(&conn, "Y", "2024-02-15", "E", 100.0, "");
        let (start, end) = (date("2023-01-01"), date("2024-12-31"));

        let years = timeline_by_bank(&conn, "X", Granularity::Year, start, end).unwrap();
        let summary: Vec<(String, f64, i64)> = years
            .iter()
            .map(|p| (p.period.to_string(), p.total_amount, p.transaction_count))
            .collect();
        assert_eq!(summary, vec![("2023".into(), 1.0, 1), ("2024".into(), 9.0, 3)]);

        let months = timeline_by_bank(&conn, "X", Granularity::Month, start, end).unwrap();
        let periods: Vec<String> = months.iter().map(|p| p.period.to_string()).collect();
        assert_eq!(periods, vec!["2023-12", "2024-01", "2024-02"]);
        assert_eq!(months[1].total_amount, 5.0);
        assert_eq!(months[1].transaction_count, 2);

        let days = timeline_by_bank(&conn, "X", Granularity::Day, start, end).unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!(days[1].period, Period::Day(date("2024-01-01")));

        let units = timeline_by_bank(&conn, "X", Granularity::Unit, start, end).unwrap();
        assert_eq!(units.len(), 4);
        assert!(units.iter().all(|p| p.transaction_count == 1));
        assert_eq!(units[2].total_amount, 3.0);
    }

    #[test]
    fn test_timeline_by_category() {
        let (_dir, conn) = test_db();
        insert(&conn, "X", "2024-03-01", "A", -5.0, "Food");
        insert(&conn, "Y", "2024-03-20", "B", -6.0, "Food");
        insert(&conn, "Y", "2024-04-02", "C", -7.0, "Food");
        insert(&conn, "Y", "2024-04-02", "D", -70.0, "Rent");
        let (start, end) = year_2024();
        let months = timeline_by_category(&conn, "Food", Granularity::Month, start, end).unwrap();
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].total_amount, -11.0);
        assert_eq!(months[1].period, Period::Month(2024, 4));
    }

    #[test]
    fn test_timeline_by_category_filters() {
        let (_dir, conn) = test_db();
        add_filter(&conn, "Utilities", "ELECTRIC", None).unwrap();
        add_filter(&conn, "Utilities", "WATER", None).unwrap();
        add_filter(&conn, "Utilities", "GAS", None).unwrap();
        insert(&conn, "X", "2024-02-01", "ELECTRIC CO", -50.0, "");
        insert(&conn, "X", "2024-01-01", "WATER DEPT", -20.0, "");
        insert(&conn, "X", "2024-01-15", "GAS CO", -30.0, "");
        apply_all_filters(&conn).unwrap();

        let (start, end) = year_2024();
        let points = timeline_by_category_filters(
            &conn,
            "Utilities",
            &["ELECTRIC".to_string(), "WATER".to_string()],
            start,
            end,
        )
        .unwrap();
        let got: Vec<(&str, String)> = points
            .iter()
            .map(|p| (p.pattern.as_str(), p.period.to_string()))
            .collect();
        assert_eq!(got, vec![("WATER", "2024-01-01".to_string()), ("ELECTRIC", "2024-02-01".to_string())]);
        assert!(timeline_by_category_filters(&conn, "Utilities", &[], start, end).unwrap().is_empty());
    }

    #[test]
    fn test_reports_do_not_mutate() {
        let (_dir, conn) = test_db();
        add_filter(&conn, "Food", "MARKET", None).unwrap();
        insert(&conn, "X", "2024-01-01", "MARKET", -1.0, "");
        let (start, end) = year_2024();
        category_balance(&conn, "Food", start, end).unwrap();
        category_non_filter_balance(&conn, "Food", start, end).unwrap();
        timeline_by_bank(&conn, "X", Granularity::Unit, start, end).unwrap();
        let category: String = conn
            .query_row("SELECT category FROM transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(category, "");
    }
}
