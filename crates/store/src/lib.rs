//! Durable, TTL-backed persistence for job snapshots and log lines.
//!
//! [`KvStore`] is the narrow key-value interface the tracker needs
//! (hashes, append-only lists, per-key expiry, key scans). It has a
//! PostgreSQL backend ([`PgKvStore`]) and an in-process backend
//! ([`MemoryKvStore`]). [`JobRecordStore`] lays job records out on top
//! of either, and [`ApplicationStore`] keeps the registered application
//! definitions next to them.

pub mod applications;
pub mod config;
pub mod connect;
pub mod error;
pub mod expiry;
pub mod kv;
pub mod memory;
pub mod postgres;
pub mod records;

use sqlx::postgres::PgPoolOptions;

pub use applications::ApplicationStore;
pub use config::{StoreBackend, StoreConfig};
pub use error::StoreError;
pub use kv::KvStore;
pub use memory::MemoryKvStore;
pub use postgres::PgKvStore;
pub use records::JobRecordStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending schema migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
