//! Pickup Ordering Service

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pickup_orders::api::{self, AppState};
use pickup_orders::config::Config;
use pickup_orders::events::EventPublisher;
use pickup_orders::payments::StripeGateway;
use pickup_orders::store::{MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "pickup_orders=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let gateway = Arc::new(StripeGateway::new(&config.stripe_secret_key, &config.stripe_api_base, &config.currency, config.upstream_timeout)?);
    let events = EventPublisher::connect(config.nats_url.as_deref()).await;

    let state = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .acquire_timeout(config.upstream_timeout)
                .connect(url)
                .await
                .context("connecting to PostgreSQL")?;
            let store = PgStore::new(pool);
            store.migrate().await.context("running migrations")?;
            AppState::new(Arc::new(store), gateway, events, &config)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            AppState::new(Arc::new(MemoryStore::new()), gateway, events, &config)
        }
    };

    let app = api::router(state, config.upstream_timeout * 3);
    tracing::info!(port = config.port, environment = %config.environment, "Pickup ordering service listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
