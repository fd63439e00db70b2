//! Dine-in tab server.
//!
//! Serves tab creation, joins, table status and the payment lock lifecycle
//! over HTTP, backed by Postgres or a process-local store.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use dine_tab::{
    db::{Database, MemoryTabRepository, PgTabRepository, TabRepository},
    orders::{MemoryOrderLedger, OrderAggregator, PgOrderAggregator},
    security::RepositoryTokenValidator,
    tab::TabManager,
};
use dt_server::{
    api,
    config::{ServerConfig, StoreBackend},
    logging, metrics,
};
use pico_args::Arguments;
use tracing::info;

const HELP: &str = "\
Run the dine-in tab server

USAGE:
  dt_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --store      BACKEND     Tab store: postgres | memory [default: env STORE_BACKEND or postgres]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  STORE_BACKEND            postgres | memory
  PAYMENT_CALLBACK_SECRET  Secret shared with the payment provider (required)
  ADMIN_API_KEY            Key for administrative endpoints (required)
  TAB_TX_MAX_ATTEMPTS      Optimistic transaction attempts [default: 8]
  METRICS_BIND             Prometheus exporter address (optional)
  RUST_LOG                 Log filter [default: info,sqlx=warn,hyper=warn]
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    store: Option<StoreBackend>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        store: pargs.opt_value_from_str("--store")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url, args.store)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(anyhow::Error::msg)?;
        info!("Prometheus metrics exported at http://{}/metrics", addr);
    }

    let (repo, orders, database): (
        Arc<dyn TabRepository>,
        Arc<dyn OrderAggregator>,
        Option<Database>,
    ) = match config.store {
        StoreBackend::Postgres => {
            info!("Connecting to database");
            let db = Database::new(&config.database)
                .await
                .context("Failed to connect to database")?;
            db.run_migrations()
                .await
                .context("Failed to run database migrations")?;
            info!("Database connected and migrated");

            let pool = Arc::new(db.pool().clone());
            (
                Arc::new(PgTabRepository::new(pool.clone())),
                Arc::new(PgOrderAggregator::new(pool)),
                Some(db),
            )
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory tab store; tabs are lost on restart");
            (
                Arc::new(MemoryTabRepository::new()),
                Arc::new(MemoryOrderLedger::new()),
                None,
            )
        }
    };

    let tokens = Arc::new(RepositoryTokenValidator::new(repo.clone()));
    let tab_manager = TabManager::new(repo, tokens, orders, config.retry.clone());
    info!(
        "Tab transactions retry up to {} times",
        tab_manager.retry_policy().max_attempts
    );

    let app = api::create_router(api::AppState::new(tab_manager, config.security.clone()));

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
    if let Some(db) = database {
        db.close().await;
        info!("Database connections closed");
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
}
