//! SQLite backend over `rusqlite`.
//!
//! Each acquire opens the database file; every statement runs on the blocking
//! pool so request tasks never block the runtime.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::Value as SqliteValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;

use super::{ConnectionSource, Row, StoreConnection};
use crate::error::StoreError;
use crate::sql::{Dialect, SqlValue};

#[derive(Clone)]
pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConnectionSource for SqliteSource {
    async fn acquire(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        let path = self.path.clone();
        let conn = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            let conn = Connection::open(path)?;
            // Match PostgreSQL: LIKE compares ASCII letters case-sensitively.
            conn.execute_batch("PRAGMA case_sensitive_like = ON")?;
            Ok(conn)
        })
        .await??;
        Ok(Box::new(SqliteConnection::new(conn)))
    }
}

/// Open SQLite handle shared with blocking-pool closures.
pub struct SqliteConnection {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteConnection {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn);
            f(&mut guard)
        })
        .await?
    }
}

#[async_trait]
impl StoreConnection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn query_rows(&mut self, sql: &str, binds: &[SqlValue]) -> Result<Vec<Row>, StoreError> {
        let sql = sql.to_string();
        let binds = to_sqlite_values(binds);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let names: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            let mut rows = stmt.query(params_from_iter(binds))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut record = Row::new();
                for (idx, name) in names.iter().enumerate() {
                    let value: SqliteValue = row.get(idx)?;
                    record.insert(name.clone(), to_json(name, value)?);
                }
                out.push(record);
            }
            Ok(out)
        })
        .await
    }

    async fn query_count(&mut self, sql: &str, binds: &[SqlValue]) -> Result<u64, StoreError> {
        let sql = sql.to_string();
        let binds = to_sqlite_values(binds);
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }

    async fn execute_committed(
        &mut self,
        sql: &str,
        binds: &[SqlValue],
    ) -> Result<u64, StoreError> {
        let sql = sql.to_string();
        let binds = to_sqlite_values(binds);
        self.with_conn(move |conn| {
            let transaction = conn.transaction()?;
            let affected = transaction.execute(&sql, params_from_iter(binds))?;
            transaction.commit()?;
            Ok(affected as u64)
        })
        .await
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn to_sqlite_values(binds: &[SqlValue]) -> Vec<SqliteValue> {
    binds
        .iter()
        .map(|value| match value {
            SqlValue::Text(text) => SqliteValue::Text(text.clone()),
            SqlValue::Integer(int) => SqliteValue::Integer(*int),
            SqlValue::Null => SqliteValue::Null,
        })
        .collect()
}

fn to_json(column: &str, value: SqliteValue) -> Result<Value, StoreError> {
    Ok(match value {
        SqliteValue::Null => Value::Null,
        SqliteValue::Integer(int) => Value::from(int),
        SqliteValue::Real(real) => Value::from(real),
        SqliteValue::Text(text) => Value::from(text),
        SqliteValue::Blob(bytes) => {
            return Err(StoreError::UnsupportedValue {
                column: column.to_string(),
                detail: format!("{}-byte blob", bytes.len()),
            })
        }
    })
}
