//! nauta - log in and out of the ETECSA Nauta captive portal.
//!
//! Cards and the current session's logout URL live in the data directory,
//! next to `connections.log`.

mod cli;
mod commands;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use nauta_core::{Config, SessionError};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};
use commands::AppContext;

/// Session history written to the data directory
const CONNECTIONS_LOG: &str = "connections.log";

/// Initialize logging: stderr honours `RUST_LOG` (default `warn`), and the
/// connection log always records the session at `info`.
fn init_tracing(debug: bool, data_dir: &Path) -> WorkerGuard {
    let stderr_filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let file_appender = tracing_appender::rolling::never(data_dir, CONNECTIONS_LOG);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_filter(stderr_filter))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(false)
                .with_filter(EnvFilter::new("nauta=info,nauta_core=info")),
        )
        .init();

    guard
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<SessionError>() {
        Some(e) if e.is_connectivity() => {
            eprintln!("Could not reach the portal, check your connection ({})", e)
        }
        _ => eprintln!("Error: {:#}", err),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let data_dir = config.ensure_data_dir()?;
    let _guard = init_tracing(cli.debug, &data_dir);
    info!(version = env!("CARGO_PKG_VERSION"), "nauta starting");

    let ctx = AppContext::new(config, data_dir);
    match cli.command {
        Commands::Up { time, card } => commands::up(&ctx, card, time).await,
        Commands::Down => commands::down(&ctx).await,
        Commands::Cards(args) => commands::cards(&ctx, args).await,
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        report_error(&e);
        std::process::exit(1);
    }
}
