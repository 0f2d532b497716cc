//! hostdb CLI entry point.

use clap::{Parser, Subcommand};
use hostdb::config::{HostdbConfig, LogFormat};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

/// hostdb - machine inventory service
#[derive(Parser, Debug)]
#[command(name = "hostdb")]
#[command(about = "Machine inventory service")]
#[command(version)]
struct Cli {
    /// Config file (defaults to <config_dir>/hostdb/config.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API server.
    Serve(cli::serve::ServeCmd),

    /// Import an inventory file into the database.
    Import(cli::import::ImportCmd),

    /// List available commands.
    Commands(cli::commands::CommandsCmd),

    /// Delete an item from the local database.
    #[command(alias = "rm")]
    Delete(cli::delete::DeleteCmd),
}

fn main() {
    let cli = Cli::parse();

    let config = match HostdbConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    init_logging(config.log_format);

    tracing::debug!(version = hostdb::VERSION, "starting hostdb");

    let result = match cli.command {
        Commands::Serve(cmd) => cmd.run(&config),
        Commands::Import(cmd) => cmd.run(&config),
        Commands::Commands(cmd) => cmd.run(),
        Commands::Delete(cmd) => cmd.run(&config),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber.
fn init_logging(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hostdb=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
