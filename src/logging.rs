//! Logging configuration and initialization.
//!
//! Uses tracing with environment-based filtering. Service logs go to stderr as
//! text or JSON lines; an optional file receives JSON lines as well.

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Crates whose events are shown by default.
const LOG_TARGETS: &[&str] = &["todo_service", "todod", "tower_http"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines, colored on a terminal
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbosity: u8,
    pub quiet: bool,
    pub format: LogFormat,
    /// Appended to, never truncated.
    pub log_file: Option<PathBuf>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins if set; otherwise the filter comes from the verbosity and
/// quiet flags.
///
/// # Errors
///
/// Returns an error if the filter is invalid, the log file cannot be opened,
/// or a global subscriber is already installed.
pub fn init_logging(options: &LogOptions) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(options.verbosity, options.quiet)))?;

    let stderr_layer = match options.format {
        LogFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(cfg!(debug_assertions))
            .with_line_number(cfg!(debug_assertions))
            .with_ansi(std::io::stderr().is_terminal())
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .boxed(),
    };

    let file_layer = options
        .log_file
        .as_deref()
        .map(open_log_file)
        .transpose()?
        .map(|file| {
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .json()
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;
    Ok(())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

fn default_filter(verbosity: u8, quiet: bool) -> String {
    if quiet {
        return "error".to_string();
    }

    let level = match verbosity {
        0 => "info",
        1 | 2 => "debug",
        _ => "trace",
    };
    let mut directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect();
    if verbosity == 2 {
        directives.push("rusqlite=debug".to_string());
    }
    directives.join(",")
}

/// Initialize logging for tests with the test writer.
pub fn init_test_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("todo_service=debug,test=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}
