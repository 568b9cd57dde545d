//! Startup wiring: build the configured [`KvStore`] backend.
//!
//! The Postgres backend is connected with exponential backoff (the
//! database often comes up after the service in compose setups) and
//! migrated before it is handed out. Nothing here retries after startup.

use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use crate::kv::KvStore;
use crate::memory::MemoryKvStore;
use crate::postgres::PgKvStore;
use crate::{create_pool, run_migrations, DbPool};

/// Build the key-value backend described by `config`.
pub async fn connect(config: &StoreConfig) -> Result<Arc<dyn KvStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory record store; records are lost on restart");
            Ok(Arc::new(MemoryKvStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = connect_pool(config).await?;
            run_migrations(&pool).await?;
            tracing::info!("Database migrations applied");
            Ok(Arc::new(PgKvStore::new(pool)))
        }
    }
}

/// Open a pool, retrying with backoff up to `connect_attempts` times.
pub async fn connect_pool(config: &StoreConfig) -> Result<DbPool, StoreError> {
    let url = config.database_url.as_deref().ok_or_else(|| {
        StoreError::Validation("DATABASE_URL is required for the postgres backend".into())
    })?;

    let mut backoff = config.connect_retry.start();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match create_pool(url, config.max_connections).await {
            Ok(pool) => {
                tracing::info!(attempt, "Database connection established");
                return Ok(pool);
            }
            Err(e) if attempt < config.connect_attempts => {
                let wait = backoff.next_wait();
                tracing::warn!(
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "Database connection failed, retrying",
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => {
                tracing::error!(attempt, error = %e, "Database connection failed, giving up");
                return Err(e.into());
            }
        }
    }
}
