use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::Result;

pub const DB_FILE_NAME: &str = "wmm.db";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS filters (
    id INTEGER PRIMARY KEY,
    category TEXT NOT NULL,
    pattern TEXT NOT NULL,
    label TEXT NOT NULL DEFAULT '',
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    bank TEXT NOT NULL,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    amount REAL NOT NULL,
    category TEXT NOT NULL DEFAULT '',
    filter_id INTEGER,
    external_id TEXT,
    not_duplicate INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (filter_id) REFERENCES filters(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    bank TEXT NOT NULL,
    imported_at TEXT DEFAULT (datetime('now')),
    record_count INTEGER NOT NULL,
    inserted_count INTEGER NOT NULL,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT
);

CREATE INDEX IF NOT EXISTS idx_transactions_bank_date ON transactions(bank, date);
CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category);
CREATE INDEX IF NOT EXISTS idx_transactions_filter ON transactions(filter_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_external_id
    ON transactions(bank, external_id) WHERE external_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_filters_category ON filters(category);
";

/// Opens a handle scoped to one operation; callers drop it when done.
pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Escapes LIKE wildcards so a pattern matches literally. Pair with `ESCAPE '\'`.
pub fn like_escape(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `?, ?, ?` with `n` placeholders, for IN lists.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}
