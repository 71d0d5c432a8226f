//! Grid query adapter for the lltools vocabulary table.
//!
//! A browser grid (DataTables legacy server-side protocol) pages, sorts,
//! filters and edits one relational table through this service. Requests
//! arrive as column-indexed HTTP parameters; every column index is resolved
//! through the [`registry::ColumnRegistry`] allowlist and every value is
//! bound, so client text never becomes SQL text.
//!
//! This module is the composition root: it loads configuration, builds the
//! registry and store source, and serves the HTTP router until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub mod error;
pub mod executor;
pub mod http;
pub mod metrics;
pub mod mutation;
pub mod order;
pub mod page;
pub mod predicate;
pub mod registry;
pub mod request;
pub mod sql;
pub mod store;

use http::{router, GridState};
use metrics::GridMetrics;
use registry::ColumnRegistry;
use store::DatabaseTarget;

/// Runtime configuration for one grid server process.
#[derive(Clone, Debug)]
pub struct GridConfig {
    /// HTTP bind address.
    pub listen_addr: SocketAddr,
    /// Store holding the grid table.
    pub database: DatabaseTarget,
    /// Path of the grid endpoint.
    pub route: String,
    /// Table the grid pages over and mutates.
    pub table: String,
    /// Table queried for tag autocomplete.
    pub tag_source_table: String,
    /// Row id column exposed as `DT_RowId`. Defaults to `rowid` on SQLite
    /// and `id` on PostgreSQL, which has no `oid` column since version 12.
    pub row_id_column: String,
}

impl GridConfig {
    /// Loads configuration from environment variables with defaults.
    pub fn from_env() -> Result<Self> {
        let listen_addr = parse_socket_addr(
            std::env::var("LLTOOLS_GRID_LISTEN_ADDR").ok(),
            "127.0.0.1:5000",
        )?;
        let database = DatabaseTarget::parse(
            &std::env::var("LLTOOLS_GRID_DATABASE_URL")
                .unwrap_or_else(|_| "dbname=lltools".to_string()),
        );
        let route = parse_route(std::env::var("LLTOOLS_GRID_ROUTE").ok(), "/vocabulary")?;
        let table = std::env::var("LLTOOLS_GRID_TABLE")
            .unwrap_or_else(|_| "vocabulary_master".to_string());
        let tag_source_table = std::env::var("LLTOOLS_GRID_TAG_SOURCE_TABLE")
            .unwrap_or_else(|_| "vocabulary_deduplicated".to_string());
        let row_id_column = std::env::var("LLTOOLS_GRID_ROW_ID_COLUMN")
            .unwrap_or_else(|_| database.default_row_id().to_string());

        Ok(Self {
            listen_addr,
            database,
            route,
            table,
            tag_source_table,
            row_id_column,
        })
    }

    /// Builds the vocabulary column registry for the configured table.
    pub fn registry(&self) -> Result<ColumnRegistry> {
        ColumnRegistry::vocabulary(&self.table, &self.tag_source_table, &self.row_id_column)
            .with_context(|| format!("build column registry for table {}", self.table))
    }
}

/// Runs the server until Ctrl-C is received.
pub async fn run(config: GridConfig) -> Result<()> {
    run_with_shutdown(config, tokio::signal::ctrl_c()).await
}

/// Runs the server until `shutdown` resolves.
pub async fn run_with_shutdown<F>(config: GridConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = Result<(), std::io::Error>> + Send + 'static,
{
    let registry = Arc::new(config.registry()?);
    let state = GridState::new(
        config.database.connection_source(),
        registry.clone(),
        Arc::new(GridMetrics::default()),
    );
    let app = router(state, &config.route);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("bind grid server {}", config.listen_addr))?;
    info!(
        addr = %config.listen_addr,
        route = %config.route,
        table = %registry.table(),
        database = ?config.database,
        "grid server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = shutdown.await {
                warn!(error = %err, "shutdown signal failed; stopping");
            }
        })
        .await
        .context("serve grid http")?;

    info!("grid server stopped");
    Ok(())
}

/// Parses an optional route override; routes must be absolute paths.
fn parse_route(value: Option<String>, default_route: &str) -> Result<String> {
    let raw = value.unwrap_or_else(|| default_route.to_string());
    let route = raw.trim();
    if !route.starts_with('/') || route.len() < 2 {
        bail!("invalid route: {raw:?}");
    }
    if matches!(route, "/live" | "/metrics") {
        bail!("route {route} is reserved");
    }
    Ok(route.to_string())
}

/// Parses an optional socket address with fallback default.
fn parse_socket_addr(value: Option<String>, default_addr: &str) -> Result<SocketAddr> {
    let raw = value.unwrap_or_else(|| default_addr.to_string());
    raw.parse::<SocketAddr>()
        .with_context(|| format!("invalid socket address: {raw}"))
}
