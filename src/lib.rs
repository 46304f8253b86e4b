//! `todo_service` - Todo record store and JSON API
//!
//! This crate provides the storage and HTTP layers behind the `todod`
//! binary: a small CRUD service for todo records backed by `SQLite`.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Todo, `TodoPatch`)
//! - [`store`] - Async record store with cancellation and deadlines
//! - [`storage`] - `SQLite` schema, queries and connection pool
//! - [`http`] - axum routes, error mapping and server lifecycle
//! - [`config`] - Layered configuration (defaults, YAML, env, CLI)
//! - [`error`] - Error types and handling
//! - [`logging`] - tracing subscriber setup
//! - [`validation`] - Title and patch checks

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod model;
pub mod storage;
pub mod store;
pub mod validation;

pub use error::{ErrorKind, Result, TodoError};
pub use model::{Todo, TodoPatch};
pub use store::TodoStore;

/// Run the CLI application.
///
/// This is the main entry point called from `main()`.
///
/// # Errors
///
/// Returns an error if logging cannot be initialized or the command fails.
pub async fn run(cli: cli::Cli) -> anyhow::Result<()> {
    use anyhow::Context;

    logging::init_logging(&cli.log_options()).context("failed to initialize logging")?;

    let overrides = cli.overrides();
    let config_file = cli.config.as_deref();
    match cli.command {
        Some(cli::Command::Migrate) => {
            cli::commands::migrate::execute(config_file, &overrides)
                .await
                .context("migration failed")?;
        }
        Some(cli::Command::Serve(_)) | None => {
            cli::commands::serve::execute(config_file, &overrides)
                .await
                .context("server failed")?;
        }
    }
    Ok(())
}
