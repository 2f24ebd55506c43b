//! Command-line interface for reportd.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// reportd - enriched, password-protected user reports on demand
#[derive(Parser, Debug)]
#[command(name = "reportd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file (default: search ./config.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP service (default)
    Serve,

    /// Write a default config file if none exists
    InitConfig,

    /// Validate the configuration and print the effective values
    CheckConfig,
}

impl Cli {
    #[must_use]
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}
