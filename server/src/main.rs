//! QuickAPI server
//!
//! Serves the demo entities over HTTP, backed by one SQLite database.
//!
//! Usage:
//!   quickapi-server --database quickapi.db --port 8080
//!
//! `RUST_LOG` overrides the log filter.

use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Parser;
use quickapi_api::HttpConfig;
use quickapi_db::Database;
use quickapi_server::{build_app, demo};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "quickapi-server")]
#[command(about = "CRUD, search and patch over HTTP for the demo entities")]
struct Args {
    /// SQLite database file, or :memory:
    #[arg(short, long, default_value = "quickapi.db")]
    database: PathBuf,

    /// HTTP port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("QuickAPI server starting...");
    let db = Database::open(&args.database)
        .with_context(|| format!("failed to open database {}", args.database.display()))?;

    let entities = demo::entities();
    let app = build_app(&db, &entities, HttpConfig::default()).context("failed to register entities")?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("failed to bind HTTP port {}", args.port))?;
    info!("HTTP API listening on port {}", args.port);

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
