//! Listing and searching of tracked jobs.

use flowtrack_core::job::JobRecord;
use flowtrack_store::{JobRecordStore, StoreError};

/// Page size used when the caller gives none (or nonsense).
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Interpret a raw `limit` query value. Absent, unparsable and
/// non-positive values all mean [`DEFAULT_LIST_LIMIT`].
pub fn effective_limit(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|&n| n > 0)
        .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
        .unwrap_or(DEFAULT_LIST_LIMIT)
}

/// Jobs whose id contains `keyword` (case-insensitive, empty matches
/// all), most recently started first, at most `limit` of them. A zero
/// `limit` means [`DEFAULT_LIST_LIMIT`].
///
/// Only the key scan can fail the listing. A record that cannot be
/// loaded for any reason is logged and left out.
pub async fn list_jobs(
    records: &JobRecordStore,
    keyword: &str,
    limit: usize,
) -> Result<Vec<JobRecord>, StoreError> {
    let limit = if limit == 0 { DEFAULT_LIST_LIMIT } else { limit };
    let keyword = keyword.to_lowercase();
    let ids = records.list_job_ids("*").await?;

    let mut jobs = Vec::with_capacity(ids.len());
    for id in ids {
        if !keyword.is_empty() && !id.to_lowercase().contains(&keyword) {
            continue;
        }
        match records.load_status(&id).await {
            Ok(job) => jobs.push(job),
            Err(e) => tracing::warn!(job_id = %id, error = %e, "Skipping unreadable job record"),
        }
    }

    jobs.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| a.id.cmp(&b.id))
    });
    jobs.truncate(limit);
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use flowtrack_store::records::status_key;
    use flowtrack_store::{KvStore, MemoryKvStore};

    use super::*;

    /// Delegates to an in-memory store, but reads of one key fail the way
    /// an exhausted connection pool does.
    struct FlakyRead {
        inner: MemoryKvStore,
        broken_key: String,
    }

    #[async_trait]
    impl KvStore for FlakyRead {
        async fn hash_set(
            &self,
            key: &str,
            fields: &[(String, String)],
            ttl: Option<Duration>,
        ) -> Result<(), StoreError> {
            self.inner.hash_set(key, fields, ttl).await
        }

        async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
            if key == self.broken_key {
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.hash_get_all(key).await
        }

        async fn list_push(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
            self.inner.list_push(key, value, ttl).await
        }

        async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
            self.inner.list_range(key).await
        }

        async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
            self.inner.expire(key, ttl).await
        }

        async fn delete(&self, key: &str) -> Result<bool, StoreError> {
            self.inner.delete(key).await
        }

        async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
            self.inner.scan_keys(pattern).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    async fn store_with(jobs: &[(&str, i64)]) -> (Arc<MemoryKvStore>, JobRecordStore) {
        let kv = Arc::new(MemoryKvStore::new());
        let records = JobRecordStore::new(kv.clone(), Duration::from_secs(60));
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        for (id, offset) in jobs {
            let job = JobRecord::started(*id, vec![], t0 + ChronoDuration::minutes(*offset));
            records.save_status(&job).await.unwrap();
        }
        (kv, records)
    }

    fn ids(jobs: &[JobRecord]) -> Vec<&str> {
        jobs.iter().map(|j| j.id.as_str()).collect()
    }

    #[test]
    fn limit_defaults() {
        assert_eq!(effective_limit(None), 100);
        assert_eq!(effective_limit(Some("abc")), 100);
        assert_eq!(effective_limit(Some("0")), 100);
        assert_eq!(effective_limit(Some("-3")), 100);
        assert_eq!(effective_limit(Some("25")), 25);
    }

    #[tokio::test]
    async fn zero_limit_lists_with_the_default_page_size() {
        let (_, records) = store_with(&[("ci-a", 0), ("ci-b", 1), ("ci-c", 2)]).await;
        let jobs = list_jobs(&records, "", 0).await.unwrap();
        assert_eq!(ids(&jobs), ["ci-c", "ci-b", "ci-a"]);
    }

    #[tokio::test]
    async fn sorts_newest_first() {
        let (_, records) = store_with(&[("ci-old", 0), ("ci-new", 20), ("ci-mid", 10)]).await;
        let jobs = list_jobs(&records, "", 100).await.unwrap();
        assert_eq!(ids(&jobs), ["ci-new", "ci-mid", "ci-old"]);
    }

    #[tokio::test]
    async fn truncates_after_sorting() {
        let (_, records) = store_with(&[("a-1", 0), ("b-2", 30), ("c-3", 10), ("d-4", 20)]).await;
        let jobs = list_jobs(&records, "", 2).await.unwrap();
        assert_eq!(ids(&jobs), ["b-2", "d-4"]);
    }

    #[tokio::test]
    async fn keyword_is_case_insensitive() {
        let (_, records) = store_with(&[("CI-Build-1", 0), ("ci-deploy-2", 5), ("nightly-build", 9)]).await;
        let jobs = list_jobs(&records, "BUILD", 100).await.unwrap();
        assert_eq!(ids(&jobs), ["nightly-build", "CI-Build-1"]);
        assert!(jobs.iter().all(|j| j.id.to_lowercase().contains("build")));
    }

    #[tokio::test]
    async fn undecodable_records_are_skipped() {
        let (kv, records) = store_with(&[("ci-good", 0)]).await;
        kv.hash_set(
            &status_key("ci-bad"),
            &[("start_time".to_string(), "not a time".to_string())],
            None,
        )
        .await
        .unwrap();

        let jobs = list_jobs(&records, "", 100).await.unwrap();
        assert_eq!(ids(&jobs), ["ci-good"]);
    }

    #[tokio::test]
    async fn keyword_is_matched_verbatim() {
        let (_, records) = store_with(&[("ci-build", 0), ("nightly build", 5)]).await;
        let jobs = list_jobs(&records, " build", 100).await.unwrap();
        assert_eq!(ids(&jobs), ["nightly build"]);
    }

    #[tokio::test]
    async fn failing_record_read_does_not_abort_the_listing() {
        let kv = Arc::new(FlakyRead {
            inner: MemoryKvStore::new(),
            broken_key: status_key("ci-bad"),
        });
        let records = JobRecordStore::new(kv.clone(), Duration::from_secs(60));
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        for id in ["ci-good", "ci-bad"] {
            records.save_status(&JobRecord::started(id, vec![], t0)).await.unwrap();
        }

        let jobs = list_jobs(&records, "", 100).await.unwrap();
        assert_eq!(ids(&jobs), ["ci-good"]);
    }
}
