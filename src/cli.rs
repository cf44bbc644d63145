//! CLI definitions for stun.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// stun CLI.
#[derive(Parser)]
#[command(name = "stun")]
#[command(about = "User-space network tunnel driven by a condition/action event loop")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long, global = true, env = "STUN_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub(crate) enum Commands {
    /// Copy stdin to stdout through the event loop (default)
    Relay {
        /// Override relay.chunk_size
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override relay.queue_capacity
        #[arg(long)]
        queue_capacity: Option<usize>,
    },

    /// Load and validate the configuration, then print it
    CheckConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["stun"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_relay_overrides() {
        let cli = Cli::try_parse_from(["stun", "relay", "--chunk-size", "512"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Relay {
                chunk_size: Some(512),
                queue_capacity: None,
            })
        );
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["stun", "check-config", "-c", "/etc/stun.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/stun.toml")));
        assert_eq!(cli.command, Some(Commands::CheckConfig));
    }

    #[test]
    fn test_unknown_subcommand() {
        assert!(Cli::try_parse_from(["stun", "serve"]).is_err());
    }
}
