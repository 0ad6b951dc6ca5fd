//! Thin driver over the embedded SQL store.
//!
//! The engine speaks SQL through the [`SqlStore`] trait only: parameterized
//! exec, row iteration, single-row fetch, and batch DDL. The host actor
//! injects whatever handle it owns; [`SqliteStore`] is the production
//! implementation over a rusqlite [`Connection`].
//!
//! No transaction surface is exposed: the actor's single-writer guarantee
//! serializes calls, and the host's persistence boundary frames durability.

use std::path::Path;

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ToSql};

use crate::error::{FsError, FsResult};

impl From<rusqlite::Error> for FsError {
    fn from(e: rusqlite::Error) -> Self {
        FsError::Storage(e.to_string())
    }
}

/// One SQL parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        SqlValue::Blob(v.to_vec())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// One result row with positional typed accessors.
#[derive(Debug, Clone)]
pub struct SqlRow(Vec<SqlValue>);

impl SqlRow {
    fn value(&self, idx: usize) -> FsResult<&SqlValue> {
        self.0
            .get(idx)
            .ok_or_else(|| FsError::storage(format!("column {idx} out of range")))
    }

    /// Signed integer column.
    pub fn i64(&self, idx: usize) -> FsResult<i64> {
        match self.value(idx)? {
            SqlValue::Integer(i) => Ok(*i),
            other => Err(FsError::storage(format!(
                "column {idx}: expected integer, got {other:?}"
            ))),
        }
    }

    /// Unsigned integer column (negative values are a storage error).
    pub fn u64(&self, idx: usize) -> FsResult<u64> {
        let v = self.i64(idx)?;
        u64::try_from(v)
            .map_err(|_| FsError::storage(format!("column {idx}: negative value {v}")))
    }

    /// Unsigned integer column that may be NULL (e.g. `MAX()` on no rows).
    pub fn opt_u64(&self, idx: usize) -> FsResult<Option<u64>> {
        match self.value(idx)? {
            SqlValue::Null => Ok(None),
            _ => self.u64(idx).map(Some),
        }
    }

    /// Text column.
    pub fn text(&self, idx: usize) -> FsResult<&str> {
        match self.value(idx)? {
            SqlValue::Text(s) => Ok(s),
            other => Err(FsError::storage(format!(
                "column {idx}: expected text, got {other:?}"
            ))),
        }
    }

    /// Blob column.
    pub fn blob(&self, idx: usize) -> FsResult<&[u8]> {
        match self.value(idx)? {
            SqlValue::Blob(b) => Ok(b),
            other => Err(FsError::storage(format!(
                "column {idx}: expected blob, got {other:?}"
            ))),
        }
    }

    /// Blob column that may be NULL (symlink `data` on non-symlinks).
    pub fn opt_blob(&self, idx: usize) -> FsResult<Option<&[u8]>> {
        match self.value(idx)? {
            SqlValue::Null => Ok(None),
            _ => self.blob(idx).map(Some),
        }
    }
}

/// Parameterized access to the actor's embedded SQL store.
pub trait SqlStore {
    /// Run a statement, returning the affected row count.
    fn execute(&self, sql: &str, params: &[SqlValue]) -> FsResult<usize>;

    /// Run a query, returning all rows.
    fn query(&self, sql: &str, params: &[SqlValue]) -> FsResult<Vec<SqlRow>>;

    /// Run a query expected to return at most one row.
    fn query_opt(&self, sql: &str, params: &[SqlValue]) -> FsResult<Option<SqlRow>>;

    /// Run a multi-statement batch (DDL).
    fn execute_batch(&self, sql: &str) -> FsResult<()>;
}

/// Production [`SqlStore`] over a rusqlite connection.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> FsResult<Self> {
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// Open an in-memory database (testing, scratch instances).
    pub fn in_memory() -> FsResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SqlRow> {
    let n = row.as_ref().column_count();
    let mut values = Vec::with_capacity(n);
    for i in 0..n {
        values.push(match row.get_ref(i)? {
            ValueRef::Null => SqlValue::Null,
            ValueRef::Integer(v) => SqlValue::Integer(v),
            ValueRef::Real(v) => SqlValue::Real(v),
            ValueRef::Text(v) => SqlValue::Text(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => SqlValue::Blob(v.to_vec()),
        });
    }
    Ok(SqlRow(values))
}

impl SqlStore for SqliteStore {
    fn execute(&self, sql: &str, params: &[SqlValue]) -> FsResult<usize> {
        Ok(self
            .conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))?)
    }

    fn query(&self, sql: &str, params: &[SqlValue]) -> FsResult<Vec<SqlRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), read_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn query_opt(&self, sql: &str, params: &[SqlValue]) -> FsResult<Option<SqlRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        match rows.next()? {
            Some(row) => Ok(Some(read_row(row)?)),
            None => Ok(None),
        }
    }

    fn execute_batch(&self, sql: &str) -> FsResult<()> {
        Ok(self.conn.execute_batch(sql)?)
    }
}
