//! Command-line interface for the ground station.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, DecodeCommand, MissionsCommand};

use crate::logging::Verbosity;

/// ground-station - Receive and stream rocket telemetry
///
/// Listens to an RN2483 LoRa radio, decodes the rocket's telemetry packets
/// and serves them to dashboards over a WebSocket.
#[derive(Debug, Parser)]
#[command(name = "ground-station")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the ground station
    Run,

    /// List serial ports
    Ports,

    /// Decode a packet given in hex
    Decode(DecodeCommand),

    /// List recorded missions
    Missions(MissionsCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub const fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Run,
        }
    }

    #[test]
    fn test_cli_name() {
        assert_eq!(Cli::command().get_name(), "ground-station");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(3, true).verbosity(), Verbosity::Quiet);
        assert_eq!(cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["ground-station", "run"]).unwrap();
        assert!(matches!(cli.command, Command::Run));
    }

    #[test]
    fn test_parse_decode() {
        let cli = Cli::try_parse_from(["ground-station", "decode", "56413341", "--json"]).unwrap();
        let Command::Decode(decode) = cli.command else {
            panic!("expected decode");
        };
        assert_eq!(decode.hex, "56413341");
        assert!(decode.json);
    }

    #[test]
    fn test_parse_missions_dir() {
        let cli = Cli::try_parse_from(["ground-station", "missions", "--dir", "/data"]).unwrap();
        let Command::Missions(missions) = cli.command else {
            panic!("expected missions");
        };
        assert_eq!(missions.dir, Some(PathBuf::from("/data")));
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::try_parse_from(["ground-station", "config", "show", "-j"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Show { json: true })
        ));
    }

    #[test]
    fn test_parse_global_flags() {
        let cli =
            Cli::try_parse_from(["ground-station", "-c", "/etc/gs.toml", "-vv", "ports"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/gs.toml")));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Ports));
    }

    #[test]
    fn test_decode_requires_payload() {
        assert!(Cli::try_parse_from(["ground-station", "decode"]).is_err());
    }
}
