//! Command-line interface definitions.
//!
//! The `bulwark` binary is an operator tool: it shows the resolved GPU
//! policy, inspects and clears the cross-process GPU lock, probes peer
//! services through their breakers, and tails push feeds.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Resilience and GPU arbitration toolkit for the service fleet
#[derive(Parser, Debug)]
#[command(name = "bulwark")]
#[command(version)]
pub struct Cli {
    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the bulwark CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the GPU policy resolved from BULWARK_GPU_* variables
    Policy,

    /// Inspect or clear the cross-process GPU lock
    #[command(subcommand)]
    Lock(LockCommand),

    /// Probe every configured peer through its circuit breaker
    Check(ConfigArgs),

    /// Print messages from a configured feed until interrupted
    Watch(WatchArgs),
}

/// Subcommands for `bulwark lock`.
#[derive(Subcommand, Debug)]
pub enum LockCommand {
    /// Show who holds the lock and whether that process is alive
    Status(LockPathArg),
    /// Remove a lock left behind by a dead process
    Clear(LockClearArgs),
}

/// Lock directory override.
#[derive(Parser, Debug)]
pub struct LockPathArg {
    /// Lock directory (defaults to the policy's lock path)
    #[arg(long)]
    pub path: Option<PathBuf>,
}

/// Arguments for `bulwark lock clear`.
#[derive(Parser, Debug)]
pub struct LockClearArgs {
    #[command(flatten)]
    pub lock: LockPathArg,

    /// Remove the lock even if its owner is still running
    #[arg(long)]
    pub force: bool,
}

/// Configuration file argument.
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "bulwark.toml")]
    pub config: PathBuf,
}

/// Arguments for `bulwark watch`.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Name of the `[feeds.<name>]` table to consume
    #[arg(short, long)]
    pub feed: String,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_lock_clear_with_force() {
        let cli = Cli::parse_from(["bulwark", "lock", "clear", "--force", "--path", "/tmp/x.lock"]);
        let Commands::Lock(LockCommand::Clear(args)) = cli.command else {
            panic!("expected lock clear");
        };
        assert!(args.force);
        assert_eq!(args.lock.path, Some(PathBuf::from("/tmp/x.lock")));
    }

    #[test]
    fn watch_requires_feed() {
        assert!(Cli::try_parse_from(["bulwark", "watch"]).is_err());
        let cli = Cli::parse_from(["bulwark", "watch", "--feed", "ticks", "-c", "fleet.toml"]);
        let Commands::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.feed, "ticks");
        assert_eq!(args.config.config, PathBuf::from("fleet.toml"));
    }
}
