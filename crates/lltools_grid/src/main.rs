//! Binary entrypoint for the lltools grid server.
//!
//! Startup stays thin: logging, configuration, then `lltools_grid::run`.

use anyhow::Result;
use lltools_grid::{run, GridConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lltools_grid=info,warn")),
        )
        .init();
    let config = GridConfig::from_env()?;
    run(config).await
}
