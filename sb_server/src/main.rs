//! Ledger HTTP server backed by PostgreSQL.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use pico_args::Arguments;
use sb_server::{
    api::{self, AppState},
    config::ServerConfig,
    logging, metrics,
};
use simple_bank::{
    db::{Database, PgLedgerStore},
    ledger::LedgerManager,
};
use tracing::info;

const HELP: &str = "\
Run the simple_bank ledger server

USAGE:
  sb_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  --migrate                Apply schema migrations before serving
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  DB_MAX_CONNECTIONS       Pool size upper bound
  TRANSFER_TIMEOUT_MS      Deadline for a whole transfer
  LOCK_TIMEOUT_MS          Row-lock wait bound (0 disables)
  ALLOW_SELF_TRANSFER      Accept transfers from an account to itself
  METRICS_BIND             Prometheus exporter address
  RUST_LOG                 Log filter
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        migrate: pargs.contains("--migrate"),
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url, args.migrate)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(Error::msg)?;
        info!("Prometheus exporter listening on {}", addr);
    }

    info!("Connecting to database");
    let db = Database::new(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected successfully");

    if config.run_migrations {
        db.migrate().await.context("Failed to run migrations")?;
        info!("Migrations applied");
    }

    let store =
        PgLedgerStore::new(db.pool().clone()).with_lock_timeout(config.lock_timeout());
    let ledger = LedgerManager::new(Arc::new(store), config.transfer.clone());
    info!(
        "Transfer deadline {:?}, lock timeout {:?}, self-transfers {:?}",
        config.transfer.transfer_timeout,
        config.transfer.lock_timeout,
        config.transfer.self_transfer
    );

    let app = api::create_router(AppState {
        ledger: Arc::new(ledger),
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down server...");
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", err);
        std::future::pending::<()>().await;
    }
}
