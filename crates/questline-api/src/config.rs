//! Host configuration from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use questline_progress::CoordinatorConfig;

use crate::error::AppError;

/// Everything the host reads from its environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` connection URL.
    pub database_url: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Connection pool size.
    pub db_max_connections: u32,
    /// Coordinator timeouts and write-behind policy.
    pub coordinator: CoordinatorConfig,
    /// Bound on the final write-behind drain at shutdown.
    pub shutdown_drain_timeout: Duration,
    /// Optional YAML file of quest definitions to upsert at startup.
    pub quest_seed_file: Option<PathBuf>,
    /// OTLP collector endpoint; span export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or any value
    /// fails to parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or any value
    /// fails to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let defaults = CoordinatorConfig::default();

        let database_url = var("DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".to_owned())
        })?;

        let coordinator = CoordinatorConfig {
            catalog_load_timeout: millis_or(
                &var,
                "CATALOG_LOAD_TIMEOUT_MS",
                defaults.catalog_load_timeout,
            )?,
            session_load_timeout: millis_or(
                &var,
                "SESSION_LOAD_TIMEOUT_MS",
                defaults.session_load_timeout,
            )?,
            persist_max_attempts: parse_or(&var, "PERSIST_MAX_ATTEMPTS", defaults.persist_max_attempts)?
                .max(1),
            persist_retry_backoff: millis_or(
                &var,
                "PERSIST_RETRY_BACKOFF_MS",
                defaults.persist_retry_backoff,
            )?,
            persist_concurrency: parse_or(&var, "PERSIST_CONCURRENCY", defaults.persist_concurrency)?
                .max(1),
            notification_capacity: defaults.notification_capacity,
        };

        Ok(Self {
            database_url,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse_or(&var, "PORT", 3000)?,
            db_max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", 10)?,
            coordinator,
            shutdown_drain_timeout: millis_or(
                &var,
                "SHUTDOWN_DRAIN_TIMEOUT_MS",
                Duration::from_secs(10),
            )?,
            quest_seed_file: var("QUEST_SEED_FILE").map(PathBuf::from),
            otlp_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }

    /// `host:port` for binding.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{name} is invalid ({raw:?}): {e}"))),
    }
}

fn millis_or<F>(var: &F, name: &str, default: Duration) -> Result<Duration, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(_) => parse_or(var, name, 0_u64).map(Duration::from_millis),
    }
}
