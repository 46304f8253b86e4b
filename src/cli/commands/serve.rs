//! Serve command implementation.

use std::path::Path;

use tracing::info;

use crate::config::{self, CliOverrides};
use crate::error::Result;
use crate::http::HttpServer;
use crate::http::server::shutdown_signal;

/// Execute the serve command.
///
/// Runs until Ctrl-C or SIGTERM, then drains in-flight requests for up to
/// the configured grace period and closes the pool.
///
/// # Errors
///
/// Returns an error if the config is invalid, the schema cannot be ensured,
/// or the listener cannot be bound.
pub async fn execute(config_file: Option<&Path>, cli: &CliOverrides) -> Result<()> {
    let config = config::load_config(config_file, cli)?;
    let store = super::open_store(&config).await?;
    let pool = store.pool().clone();

    info!(
        database = %config.database.display(),
        max_open = config.pool.max_open,
        "Starting todo service"
    );
    let result = HttpServer::new(store, &config).start(shutdown_signal()).await;

    pool.close();
    info!("Server stopped");
    Ok(result?)
}
