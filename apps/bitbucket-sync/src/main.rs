//! xavyo Bitbucket sync - operator CLI for the Bitbucket connector
//!
//! Reads credentials from the environment (or a `.env` file) and lets an
//! operator:
//! - Validate credentials and print the resolved scope
//! - Walk every resource, entitlement and grant in scope
//! - Grant or revoke a single entitlement

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;

use error::CliResult;

const DEFAULT_LOG_FILTER: &str = "info,xavyo_connector_bitbucket=debug";

/// Bitbucket Cloud access sync
#[derive(Parser)]
#[command(name = "xavyo-bitbucket-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the credentials and print the workspaces in scope
    Validate(commands::validate::ValidateArgs),

    /// List every resource, entitlement and grant in scope
    Sync(commands::sync::SyncArgs),

    /// Give a principal an entitlement
    Grant(commands::grant::GrantArgs),

    /// Take an entitlement away from a principal
    Revoke(commands::revoke::RevokeArgs),
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine, the environment may already be set.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight requests");
            on_interrupt.cancel();
        }
    });

    match run(cli, cancel).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli, cancel: CancellationToken) -> CliResult<()> {
    match cli.command {
        Commands::Validate(args) => commands::validate::execute(args, cancel).await,
        Commands::Sync(args) => commands::sync::execute(args, cancel).await,
        Commands::Grant(args) => commands::grant::execute(args, cancel).await,
        Commands::Revoke(args) => commands::revoke::execute(args, cancel).await,
    }
}
