//! PostgreSQL [`KvStore`] backend.
//!
//! Keys live in `kv_entries` (one row per key, with its kind and expiry);
//! hash fields and list items hang off it with `ON DELETE CASCADE`.
//! Expired rows are filtered out of every read and removed for good by
//! [`KvStore::purge_expired`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::StoreError;
use crate::kv::{glob_to_like, KvStore};

/// Predicate shared by every read: the key exists and has not expired.
const LIVE: &str = "(e.expires_at IS NULL OR e.expires_at > NOW())";

/// A [`KvStore`] on top of a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgKvStore {
    pool: PgPool,
}

impl PgKvStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Make sure `key` exists with the given kind inside `tx`, setting its
    /// expiry when `ttl` is given.
    ///
    /// An expired row is dropped first so the write starts from an empty
    /// value, as it would on a fresh key. A kind mismatch leaves `tx` to
    /// roll back, expiry included.
    async fn claim_key(
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
        kind: &'static str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM kv_entries \
             WHERE key = $1 AND expires_at IS NOT NULL AND expires_at <= NOW()",
        )
        .bind(key)
        .execute(&mut **tx)
        .await?;

        let actual: String = sqlx::query_scalar(
            "INSERT INTO kv_entries (key, kind, expires_at) \
             VALUES ($1, $2, NOW() + make_interval(secs => $3::float8)) \
             ON CONFLICT (key) DO UPDATE SET updated_at = NOW(), \
                 expires_at = COALESCE(EXCLUDED.expires_at, kv_entries.expires_at) \
             RETURNING kind",
        )
        .bind(key)
        .bind(kind)
        .bind(ttl.map(|t| t.as_secs_f64()))
        .fetch_one(&mut **tx)
        .await?;

        if actual != kind {
            return Err(StoreError::WrongType {
                key: key.to_string(),
                actual,
            });
        }
        Ok(())
    }

    async fn kind_of(&self, key: &str) -> Result<Option<String>, StoreError> {
        let query = format!("SELECT e.kind FROM kv_entries e WHERE e.key = $1 AND {LIVE}");
        Ok(sqlx::query_scalar::<_, String>(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?)
    }

    fn ensure_kind(key: &str, actual: Option<String>, wanted: &str) -> Result<bool, StoreError> {
        match actual {
            None => Ok(false),
            Some(kind) if kind == wanted => Ok(true),
            Some(kind) => Err(StoreError::WrongType {
                key: key.to_string(),
                actual: kind,
            }),
        }
    }
}

#[async_trait]
impl KvStore for PgKvStore {
    async fn hash_set(
        &self,
        key: &str,
        fields: &[(String, String)],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let (names, values): (Vec<String>, Vec<String>) = fields.iter().cloned().unzip();

        let mut tx = self.pool.begin().await?;
        Self::claim_key(&mut tx, key, "hash", ttl).await?;
        sqlx::query(
            "INSERT INTO kv_hash_fields (key, field, value) \
             SELECT $1, f, v FROM UNNEST($2::text[], $3::text[]) AS t(f, v) \
             ON CONFLICT (key, field) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(&names)
        .bind(&values)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        if !Self::ensure_kind(key, self.kind_of(key).await?, "hash")? {
            return Ok(HashMap::new());
        }
        let query = format!(
            "SELECT f.field, f.value FROM kv_hash_fields f \
             JOIN kv_entries e ON e.key = f.key \
             WHERE f.key = $1 AND {LIVE}"
        );
        let rows = sqlx::query_as::<_, (String, String)>(&query)
            .bind(key)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn list_push(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        Self::claim_key(&mut tx, key, "list", ttl).await?;
        sqlx::query("INSERT INTO kv_list_items (key, value) VALUES ($1, $2)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        if !Self::ensure_kind(key, self.kind_of(key).await?, "list")? {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT i.value FROM kv_list_items i \
             JOIN kv_entries e ON e.key = i.key \
             WHERE i.key = $1 AND {LIVE} \
             ORDER BY i.id"
        );
        Ok(sqlx::query_scalar::<_, String>(&query)
            .bind(key)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE kv_entries \
             SET expires_at = NOW() + make_interval(secs => $2), updated_at = NOW() \
             WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())",
        )
        .bind(key)
        .bind(ttl.as_secs_f64())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let deleted: Option<bool> = sqlx::query_scalar(
            "DELETE FROM kv_entries WHERE key = $1 \
             RETURNING (expires_at IS NULL OR expires_at > NOW())",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(deleted.unwrap_or(false))
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let query = format!(
            "SELECT e.key FROM kv_entries e \
             WHERE e.key LIKE $1 ESCAPE '\\' AND {LIVE} \
             ORDER BY e.key"
        );
        Ok(sqlx::query_scalar::<_, String>(&query)
            .bind(glob_to_like(pattern))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
