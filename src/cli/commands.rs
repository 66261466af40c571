//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Decode command arguments.
#[derive(Debug, Args)]
pub struct DecodeCommand {
    /// Packet bytes in hex, as printed by the radio
    pub hex: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Missions command arguments.
#[derive(Debug, Args)]
pub struct MissionsCommand {
    /// Missions directory (defaults to the configured one)
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,
}
