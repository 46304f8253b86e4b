//! Migrate command implementation.
//!
//! Creates the todos table in the configured database, or checks that an
//! existing one is at a version this build understands.

use std::path::Path;

use tracing::info;

use crate::config::{self, CliOverrides};
use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;

/// Execute the migrate command.
///
/// # Errors
///
/// Returns an error if the config is invalid, the database cannot be
/// opened, or it was written by a newer schema version.
pub async fn execute(config_file: Option<&Path>, cli: &CliOverrides) -> Result<()> {
    let config = config::load_config(config_file, cli)?;
    let store = super::open_store(&config).await?;
    store.pool().close();

    info!(
        database = %config.database.display(),
        version = CURRENT_SCHEMA_VERSION,
        "Schema is up to date"
    );
    println!(
        "{}: schema version {CURRENT_SCHEMA_VERSION}",
        config.database.display()
    );
    Ok(())
}
