//! Store capability consumed by the executor and mutation handler.
//!
//! A [`ConnectionSource`] hands out one [`StoreConnection`] per request. The
//! connection is released when the boxed value is dropped, which happens on
//! every exit path of the handler that acquired it.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::sql::{Dialect, SqlValue};

mod postgres;
mod sqlite;
#[cfg(test)]
pub(crate) mod testing;

pub use postgres::{PostgresConnection, PostgresSource};
pub use sqlite::{SqliteConnection, SqliteSource};

/// One fetched row, keyed by select alias in select order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A request-scoped connection.
#[async_trait]
pub trait StoreConnection: Send {
    /// Placeholder syntax this connection expects.
    fn dialect(&self) -> Dialect;

    /// Runs a query and returns every row.
    async fn query_rows(&mut self, sql: &str, binds: &[SqlValue]) -> Result<Vec<Row>, StoreError>;

    /// Runs a single-row, single-column `COUNT(*)` style query.
    async fn query_count(&mut self, sql: &str, binds: &[SqlValue]) -> Result<u64, StoreError>;

    /// Runs one statement inside its own transaction and commits it.
    /// Returns the number of affected rows.
    async fn execute_committed(&mut self, sql: &str, binds: &[SqlValue])
        -> Result<u64, StoreError>;
}

/// Hands out request-scoped connections.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn StoreConnection>, StoreError>;
}

/// Where the grid table lives.
#[derive(Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// libpq-style conninfo or `postgres://` URL.
    Postgres { conninfo: String },
    /// SQLite database file.
    Sqlite { path: PathBuf },
}

impl DatabaseTarget {
    /// `sqlite:<path>` selects SQLite; anything else is PostgreSQL conninfo.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().strip_prefix("sqlite:") {
            Some(path) => Self::Sqlite {
                path: PathBuf::from(path),
            },
            None => Self::Postgres {
                conninfo: raw.trim().to_string(),
            },
        }
    }

    /// Row id column used when none is configured.
    ///
    /// SQLite exposes the physical `rowid`. PostgreSQL 12 removed user table
    /// `oid` columns, so the surrogate key `id` stands in for it there.
    pub fn default_row_id(&self) -> &'static str {
        match self {
            Self::Postgres { .. } => "id",
            Self::Sqlite { .. } => "rowid",
        }
    }

    pub fn connection_source(&self) -> Arc<dyn ConnectionSource> {
        match self {
            Self::Postgres { conninfo } => Arc::new(PostgresSource::new(conninfo.clone())),
            Self::Sqlite { path } => Arc::new(SqliteSource::new(path.clone())),
        }
    }
}

// Conninfo may carry a password, so only the backend kind is printed.
impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres { .. } => f.write_str("Postgres { .. }"),
            Self::Sqlite { path } => f.debug_struct("Sqlite").field("path", path).finish(),
        }
    }
}
