//! chartkit - CLI entry point that dispatches to subcommands

use chartkit::cli::{Cli, Commands};
use chartkit::config::ConfigManager;
use chartkit::error::ChartkitResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ChartkitResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("chartkit=warn"),
        1 => EnvFilter::new("chartkit=info"),
        _ => EnvFilter::new("chartkit=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }

    debug!(path = %config_manager.path().display(), "Configuration loaded");

    match cli.command {
        Commands::Login(args) => chartkit::cli::commands::login(args, &config).await,
        Commands::Key(args) => chartkit::cli::commands::key(args),
        Commands::Config(args) => {
            chartkit::cli::commands::config(args, &config_manager, &config).await
        }
    }
}
