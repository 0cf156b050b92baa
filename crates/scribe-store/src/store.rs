use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use crate::db::init_db;
use crate::error::StoreError;

/// SQLite-backed implementation of every storage contract in `scribe_core::store`.
///
/// Wraps a single connection in a `Mutex`; each trait method holds the lock
/// for exactly one statement (or one read-modify-write on a single row), so
/// a crash between pipeline steps never leaves a half-written record.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> crate::error::Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Private in-memory database (tests, dry runs).
    pub fn open_in_memory() -> crate::error::Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Run `f` with the connection locked and map adapter errors into the core taxonomy.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> crate::error::Result<T>,
    ) -> scribe_core::Result<T> {
        let conn = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        f(&conn).map_err(Into::into)
    }
}

// --- column helpers --------------------------------------------------------

/// Fixed-width RFC 3339 so lexical order in SQL equals chronological order.
pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn opt_ts(dt: &Option<DateTime<Utc>>) -> Option<String> {
    dt.as_ref().map(ts)
}

pub(crate) fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub(crate) fn opt_ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a TEXT column into one of the domain enums (`FromStr<Err = String>`).
pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Turn "no row updated" into a `NotFound` for the given record.
pub(crate) fn expect_one(changed: usize, kind: &'static str, id: &str) -> crate::error::Result<()> {
    if changed == 0 {
        return Err(StoreError::NotFound {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}
