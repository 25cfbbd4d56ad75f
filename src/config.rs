//! Service configuration

use anyhow::{bail, Context};
use chrono::{FixedOffset, Offset, Utc};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL; the in-memory store is used when absent
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub port: u16,
    /// development | staging | production
    pub environment: String,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    /// ISO currency code sent to the payment processor, lowercase
    pub currency: String,
    /// Redirect after a successful checkout; `{CHECKOUT_SESSION_ID}` is filled in by Stripe
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub nats_url: Option<String>,
    /// Bound on every store and payment processor call
    pub upstream_timeout: Duration,
    /// Extra attempts for idempotent reads that fail with an upstream error
    pub read_retries: u32,
    /// Archive orders as soon as they reach a terminal status
    pub auto_archive_terminal: bool,
    /// Offset used to interpret `HH:MM` pickup times
    pub restaurant_offset: FixedOffset,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 10,
            port: 8083,
            environment: "development".into(),
            stripe_secret_key: String::new(),
            stripe_api_base: "https://api.stripe.com".into(),
            currency: "krw".into(),
            checkout_success_url: "http://localhost:3000/checkout/success?session_id={CHECKOUT_SESSION_ID}".into(),
            checkout_cancel_url: "http://localhost:3000/cart".into(),
            nats_url: None,
            upstream_timeout: Duration::from_secs(10),
            read_retries: 2,
            auto_archive_terminal: false,
            restaurant_offset: Utc.fix(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let environment = std::env::var("ENVIRONMENT").unwrap_or(defaults.environment);

        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY").unwrap_or_default();
        if stripe_secret_key.is_empty() && environment != "development" {
            bail!("STRIPE_SECRET_KEY must be set in {environment} environment");
        }

        let offset_minutes: i32 = parse_var("RESTAURANT_UTC_OFFSET_MINUTES")?.unwrap_or(0);
        let restaurant_offset = FixedOffset::east_opt(offset_minutes * 60)
            .with_context(|| format!("RESTAURANT_UTC_OFFSET_MINUTES out of range: {offset_minutes}"))?;

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS")?.unwrap_or(defaults.db_max_connections),
            port: parse_var("PORT")?.unwrap_or(defaults.port),
            environment,
            stripe_secret_key,
            stripe_api_base: std::env::var("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            currency: std::env::var("CURRENCY").map(|c| c.to_lowercase()).unwrap_or(defaults.currency),
            checkout_success_url: std::env::var("CHECKOUT_SUCCESS_URL").unwrap_or(defaults.checkout_success_url),
            checkout_cancel_url: std::env::var("CHECKOUT_CANCEL_URL").unwrap_or(defaults.checkout_cancel_url),
            nats_url: std::env::var("NATS_URL").ok().filter(|s| !s.is_empty()),
            upstream_timeout: parse_var("UPSTREAM_TIMEOUT_SECS")?.map(Duration::from_secs).unwrap_or(defaults.upstream_timeout),
            read_retries: parse_var("READ_RETRIES")?.unwrap_or(defaults.read_retries),
            auto_archive_terminal: parse_var("AUTO_ARCHIVE_TERMINAL")?.unwrap_or(false),
            restaurant_offset,
        })
    }
}

fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map(Some).with_context(|| format!("invalid {name}: {raw}")),
        _ => Ok(None),
    }
}
