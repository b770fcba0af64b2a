//! Plantstore - a command-line storefront for garden plants.
//!
//! Log in once, then list, create, update and delete plant records. The
//! access token is kept in the OS keychain (or the configured backend) and
//! refreshed transparently when it expires.

mod commands;

use std::io;

use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Cli;

/// Initialize the tracing subscriber for logging
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (writer, guard) = tracing_appender::non_blocking(io::stderr());
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let guard = init_tracing();
    info!("Plantstore starting");

    if let Err(e) = commands::execute(cli).await {
        eprintln!("Error: {:#}", e);
        if let Some(hint) = commands::hint_for(&e) {
            eprintln!("{}", hint);
        }
        // Flush buffered log lines before exiting
        drop(guard);
        std::process::exit(1);
    }
}
