//! Error taxonomy for the grid adapter.
//!
//! `GridError` is what request handling returns; `StoreError` is what the
//! store backends return. Only `GridError` messages ever reach a client, and
//! `QueryFailed` renders without the SQL text or store detail.

use thiserror::Error;

/// Failures raised while translating or executing one grid request.
#[derive(Debug, Error)]
pub enum GridError {
    /// The request named a column that is not in the registry, or named a
    /// placeholder column where a stored column is required.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// A client column index had no corresponding display column.
    #[error("column index {index} out of range (columns: {len})")]
    OutOfRange { index: i64, len: usize },

    /// Negative offset, or a length below the `-1` "no limit" sentinel.
    #[error("invalid page: offset={offset:?} length={length:?}")]
    InvalidPage {
        offset: Option<i64>,
        length: Option<i64>,
    },

    /// A required request field was absent or not parseable.
    #[error("missing or invalid parameter: {0}")]
    MissingParameter(&'static str),

    /// A written value does not fit the target column's kind.
    #[error("invalid value for column {column}: {value:?}")]
    InvalidValue { column: String, value: String },

    /// The store rejected or failed a statement.
    #[error("query failed")]
    QueryFailed(#[source] StoreError),
}

impl GridError {
    /// Returns true when the error is caused by client input rather than the store.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::QueryFailed(_))
    }
}

/// Failures surfaced by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("postgres: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("blocking store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A row carried a value the backend cannot represent as JSON.
    #[error("unsupported value in column {column}: {detail}")]
    UnsupportedValue { column: String, detail: String },
}

/// Shorthand used across the request path.
pub type GridResult<T> = Result<T, GridError>;
