//! Naira Storefront - storefront and admin console service

use anyhow::Result;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use naira_storefront::{
    api::{self, AppState},
    config::Config,
    domain::events::EventPublisher,
    store::{Backend, MemoryStore, PgStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::debug!(?config, "loaded configuration");

    let store = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url.expose_secret()).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("using postgres document store");
            Backend::Postgres(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory document store");
            Backend::Memory(MemoryStore::new())
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(err) => {
                tracing::warn!(error = %err, "NATS unavailable; domain events will only be logged");
                None
            }
        },
        None => None,
    };

    tokio::fs::create_dir_all(config.storage_dir.join(&config.storage_bucket)).await?;
    let app = api::router(AppState::new(&config, store, EventPublisher::new(nats)));

    let addr = config.socket_addr();
    tracing::info!("🚀 Naira Storefront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
