use std::time::Duration;

use flowtrack_core::backoff::BackoffPolicy;

/// Default record time-to-live: 100 days.
pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(100 * 24 * 3600);

/// Which [`KvStore`](crate::KvStore) implementation to build at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

/// Record store configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Required for the Postgres backend.
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Sliding time-to-live applied with every write.
    pub record_ttl: Duration,
    /// How often expired keys are physically removed.
    pub purge_interval: Duration,
    /// Backoff between connection attempts at startup.
    pub connect_retry: BackoffPolicy,
    pub connect_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: None,
            max_connections: 10,
            record_ttl: DEFAULT_RECORD_TTL,
            purge_interval: Duration::from_secs(3600),
            connect_retry: BackoffPolicy {
                first: Duration::from_secs(1),
                ceiling: Duration::from_secs(30),
                factor: 2,
            },
            connect_attempts: 5,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                                   |
    /// |-------------------------|-------------------------------------------|
    /// | `STORE_BACKEND`         | `postgres` if `DATABASE_URL` set, else `memory` |
    /// | `DATABASE_URL`          | unset                                     |
    /// | `DB_MAX_CONNECTIONS`    | `10`                                      |
    /// | `RECORD_TTL_SECS`       | `8640000` (100 days)                      |
    /// | `PURGE_INTERVAL_SECS`   | `3600`                                    |
    /// | `DB_CONNECT_ATTEMPTS`   | `5`                                       |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let backend = match std::env::var("STORE_BACKEND") {
            Ok(raw) => raw
                .parse()
                .expect("STORE_BACKEND must be 'postgres' or 'memory'"),
            Err(_) if database_url.is_some() => StoreBackend::Postgres,
            Err(_) => StoreBackend::Memory,
        };

        let max_connections: u32 = std::env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| defaults.max_connections.to_string())
            .parse()
            .expect("DB_MAX_CONNECTIONS must be a valid u32");

        let record_ttl_secs: u64 = std::env::var("RECORD_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_RECORD_TTL.as_secs().to_string())
            .parse()
            .expect("RECORD_TTL_SECS must be a valid u64");

        let purge_interval_secs: u64 = std::env::var("PURGE_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("PURGE_INTERVAL_SECS must be a valid u64");

        let connect_attempts: u32 = std::env::var("DB_CONNECT_ATTEMPTS")
            .unwrap_or_else(|_| defaults.connect_attempts.to_string())
            .parse()
            .expect("DB_CONNECT_ATTEMPTS must be a valid u32");

        Self {
            backend,
            database_url,
            max_connections,
            record_ttl: Duration::from_secs(record_ttl_secs),
            purge_interval: Duration::from_secs(purge_interval_secs.max(1)),
            connect_retry: defaults.connect_retry,
            connect_attempts: connect_attempts.max(1),
        }
    }
}
