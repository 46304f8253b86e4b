//! Command-line interface for `todod`.
//!
//! ```text
//! todod [--config <path>] [--database <path>] [-v...] [-q] [serve|migrate]
//! ```
//!
//! With no subcommand the service is started.

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CliOverrides;
use crate::logging::{LogFormat, LogOptions};

/// Todo record service
#[derive(Parser, Debug)]
#[command(name = "todod")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to a YAML config file (default: ./todod.yaml if present)
    #[arg(long, global = true, env = "TODO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the `SQLite` database file
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Also append JSON logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the HTTP API (default)
    Serve(ServeArgs),

    /// Create or check the schema and exit
    Migrate,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,
}

impl Cli {
    #[must_use]
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            verbosity: self.verbose,
            quiet: self.quiet,
            format: self.log_format,
            log_file: self.log_file.clone(),
        }
    }

    /// Config overrides given on the command line.
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        let serve = match &self.command {
            Some(Command::Serve(args)) => args.clone(),
            _ => ServeArgs::default(),
        };
        CliOverrides {
            host: serve.host,
            port: serve.port,
            database: self.database.clone(),
        }
    }
}
