//! School Ledger Server
//!
//! Canteen / library ledger REST API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use school_ledger_server::{
    api,
    config::AppConfig,
    repository::{MemoryRepository, PgRepository, Store},
    services::email,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("school_ledger_server={},tower_http=debug", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(
        mode = config.ledger.mode.title(),
        "Starting School Ledger Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let store: Arc<dyn Store> = if config.database.is_memory() {
        tracing::warn!("Using the in-memory store, data is lost on exit");
        Arc::new(MemoryRepository::new())
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .connect(&config.database.url)
            .await
            .context("Failed to connect to database")?;

        tracing::info!("Connected to database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;

        tracing::info!("Database migrations completed");
        Arc::new(PgRepository::new(pool))
    };

    if !config.email.enabled {
        tracing::info!("E-mail delivery disabled, messages will be logged");
    }
    let mailer = email::from_config(&config.email);

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState::new(config, store, mailer);
    let app = api::router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
