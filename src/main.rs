use bulwark::adapter::inbound::cli::command::{Cli, Commands, LockCommand};
use bulwark::adapter::inbound::cli::output::{self, OutputConfig};
use bulwark::adapter::inbound::cli::watch::PrintHandler;
use bulwark::adapter::inbound::cli::{check, lock, policy, watch};
use bulwark::error::Result;
use bulwark::infrastructure::bootstrap;
use bulwark::infrastructure::config::{Config, LoggingConfig};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    output::configure(OutputConfig::new(cli.json, cli.quiet, cli.verbose));

    if let Err(e) = run(cli).await {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let log_override = cli.quiet || cli.verbose > 0;
    match cli.command {
        Commands::Policy => {
            init_cli_logging();
            policy::execute()
        }
        Commands::Lock(LockCommand::Status(args)) => {
            init_cli_logging();
            lock::execute_status(&args)
        }
        Commands::Lock(LockCommand::Clear(args)) => {
            init_cli_logging();
            lock::execute_clear(&args)
        }
        Commands::Check(args) => {
            let config = load_config(&args.config, log_override)?;
            let registry = bootstrap::build_registry(&config);
            let peers = bootstrap::build_peers(&config, &registry)?;
            check::execute(&args.config, &peers).await
        }
        Commands::Watch(args) => {
            let config = load_config(&args.config.config, log_override)?;
            let consumer = bootstrap::build_consumer(&config, &args.feed, Arc::new(PrintHandler))?;
            watch::execute(consumer).await
        }
    }
}

fn init_cli_logging() {
    LoggingConfig {
        level: output::log_level().to_string(),
        ..LoggingConfig::default()
    }
    .init();
}

fn load_config(path: &Path, log_override: bool) -> Result<Config> {
    let mut config = Config::load(path)?;
    if log_override {
        config.logging.level = output::log_level().to_string();
    }
    config.init_logging();
    Ok(config)
}
