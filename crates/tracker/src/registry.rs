//! Live tracking scopes, indexed by job id.
//!
//! Each entry pairs a job's cancellation token with the handle of the
//! task supervising its watcher and tailer. Entries whose task already
//! finished are pruned whenever the map is touched.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Tracking {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct TrackingRegistry {
    entries: Mutex<HashMap<String, Tracking>>,
}

impl TrackingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job's scope. An existing live scope under the same id
    /// is cancelled, replaced and waited for (up to `timeout`).
    pub async fn register(
        &self,
        job_id: &str,
        cancel: CancellationToken,
        handle: JoinHandle<()>,
        timeout: Duration,
    ) {
        let previous = {
            let mut entries = self.entries.lock().await;
            entries.retain(|_, t| !t.handle.is_finished());
            entries.insert(job_id.to_string(), Tracking { cancel, handle })
        };
        if let Some(previous) = previous {
            tracing::warn!(job_id, "Replacing live tracking scope");
            previous.cancel.cancel();
            if tokio::time::timeout(timeout, previous.handle).await.is_err() {
                tracing::warn!(job_id, timeout_secs = timeout.as_secs(), "Replaced tracking did not stop in time");
            }
        }
    }

    /// Cancel a job's scope and wait (up to `timeout`) for its tasks to
    /// exit. Returns whether the job was being tracked.
    pub async fn cancel(&self, job_id: &str, timeout: Duration) -> bool {
        let Some(tracking) = self.entries.lock().await.remove(job_id) else {
            return false;
        };
        if tracking.handle.is_finished() {
            return false;
        }

        tracking.cancel.cancel();
        if tokio::time::timeout(timeout, tracking.handle).await.is_err() {
            tracing::warn!(job_id, timeout_secs = timeout.as_secs(), "Tracking did not stop in time");
        }
        true
    }

    pub async fn is_tracking(&self, job_id: &str) -> bool {
        self.entries
            .lock()
            .await
            .get(job_id)
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Number of jobs currently tracked.
    pub async fn active(&self) -> usize {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, t| !t.handle.is_finished());
        entries.len()
    }

    /// Wait for every registered scope to exit, up to `timeout` each.
    /// Callers cancel the scopes first.
    pub async fn drain(&self, timeout: Duration) {
        let drained: Vec<(String, Tracking)> = self.entries.lock().await.drain().collect();
        for (job_id, tracking) in drained {
            tracking.cancel.cancel();
            if tokio::time::timeout(timeout, tracking.handle).await.is_err() {
                tracing::warn!(job_id = %job_id, "Tracking did not stop in time");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    const WAIT: Duration = Duration::from_secs(1);

    fn spawn_until_cancelled(cancel: &CancellationToken) -> JoinHandle<()> {
        let cancel = cancel.clone();
        tokio::spawn(async move { cancel.cancelled().await })
    }

    #[tokio::test]
    async fn cancel_stops_and_forgets_the_job() {
        let registry = TrackingRegistry::new();
        let token = CancellationToken::new();
        registry.register("w1", token.clone(), spawn_until_cancelled(&token), WAIT).await;
        assert!(registry.is_tracking("w1").await);

        assert!(registry.cancel("w1", Duration::from_secs(1)).await);
        assert!(token.is_cancelled());
        assert!(!registry.is_tracking("w1").await);
        assert!(!registry.cancel("w1", Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn finished_entries_are_pruned() {
        let registry = TrackingRegistry::new();
        let handle = tokio::spawn(async {});
        registry.register("w1", CancellationToken::new(), handle, WAIT).await;
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(registry.active().await, 0);
    }

    #[tokio::test]
    async fn re_registering_cancels_the_previous_scope() {
        let registry = TrackingRegistry::new();
        let first = CancellationToken::new();
        registry.register("w1", first.clone(), spawn_until_cancelled(&first), WAIT).await;
        let second = CancellationToken::new();
        registry.register("w1", second.clone(), spawn_until_cancelled(&second), WAIT).await;

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(registry.active().await, 1);
    }

    #[tokio::test]
    async fn re_registering_waits_for_the_previous_scope_to_exit() {
        let registry = TrackingRegistry::new();
        let first = CancellationToken::new();
        let exited = Arc::new(AtomicBool::new(false));
        let handle = {
            let (first, exited) = (first.clone(), exited.clone());
            tokio::spawn(async move {
                first.cancelled().await;
                tokio::time::sleep(Duration::from_millis(50)).await;
                exited.store(true, Ordering::SeqCst);
            })
        };
        registry.register("w1", first, handle, WAIT).await;

        let second = CancellationToken::new();
        registry.register("w1", second.clone(), spawn_until_cancelled(&second), WAIT).await;
        assert!(exited.load(Ordering::SeqCst));
        assert!(registry.is_tracking("w1").await);
    }

    #[tokio::test(start_paused = true)]
    async fn re_registering_gives_up_on_a_stuck_scope() {
        let registry = TrackingRegistry::new();
        registry
            .register("w1", CancellationToken::new(), tokio::spawn(std::future::pending()), WAIT)
            .await;

        let second = CancellationToken::new();
        let started = tokio::time::Instant::now();
        registry.register("w1", second.clone(), spawn_until_cancelled(&second), WAIT).await;
        assert!(started.elapsed() >= WAIT);
        assert!(registry.is_tracking("w1").await);
    }

    #[tokio::test]
    async fn drain_waits_for_every_scope() {
        let registry = TrackingRegistry::new();
        let tokens: Vec<_> = (0..3).map(|_| CancellationToken::new()).collect();
        for (i, token) in tokens.iter().enumerate() {
            registry
                .register(&format!("w{i}"), token.clone(), spawn_until_cancelled(token), WAIT)
                .await;
        }
        registry.drain(Duration::from_secs(1)).await;
        assert!(tokens.iter().all(CancellationToken::is_cancelled));
        assert_eq!(registry.active().await, 0);
    }
}
