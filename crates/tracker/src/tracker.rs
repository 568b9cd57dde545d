//! Launches and supervises per-job tracking.
//!
//! [`JobTracker`] is created once at application startup. Every launched
//! job gets its own cancellation scope (a child of the tracker's root
//! token) shared by its watcher and tailer, plus a supervisor task that
//! owns both.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use flowtrack_engine::WorkflowEngine;
use flowtrack_store::JobRecordStore;

use crate::config::TrackerConfig;
use crate::error::ServiceError;
use crate::registry::TrackingRegistry;
use crate::tailer::LogTailer;
use crate::watcher::JobWatcher;

pub struct JobTracker {
    engine: Arc<dyn WorkflowEngine>,
    records: JobRecordStore,
    config: TrackerConfig,
    registry: TrackingRegistry,
    /// Master cancellation token -- cancelled during shutdown.
    root: CancellationToken,
}

impl JobTracker {
    pub fn new(engine: Arc<dyn WorkflowEngine>, records: JobRecordStore, config: TrackerConfig) -> Self {
        Self {
            engine,
            records,
            config,
            registry: TrackingRegistry::new(),
            root: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn registry(&self) -> &TrackingRegistry {
        &self.registry
    }

    /// Persist the job's initial snapshot, then start tracking it in the
    /// background.
    ///
    /// Returns once the initial snapshot is stored, so pollers never see
    /// a submitted job as missing.
    pub async fn launch(&self, job_id: &str, phase_names: Vec<String>) -> Result<(), ServiceError> {
        if self.root.is_cancelled() {
            return Err(ServiceError::ShuttingDown);
        }
        // A previous scope for this id must write its final snapshot
        // before the new initial one lands.
        if self.registry.cancel(job_id, self.config.cancel_timeout).await {
            tracing::warn!(job_id, "Relaunching a job that was still tracked");
        }

        let watcher = JobWatcher::start(
            self.engine.clone(),
            self.records.clone(),
            self.config.reopen.clone(),
            job_id,
            phase_names,
        )
        .await?;
        let tailer = LogTailer::new(
            self.engine.clone(),
            self.records.clone(),
            job_id,
            self.config.log_container.clone(),
        );

        let scope = self.root.child_token();
        let handle = tokio::spawn(supervise(
            watcher,
            tailer,
            scope.clone(),
            self.config.log_drain_grace,
        ));
        self.registry
            .register(job_id, scope, handle, self.config.cancel_timeout)
            .await;
        Ok(())
    }

    /// Stop tracking one job. Returns whether it was being tracked.
    pub async fn cancel(&self, job_id: &str) -> bool {
        self.registry.cancel(job_id, self.config.cancel_timeout).await
    }

    /// Cancel every scope and wait for the tasks to write their final
    /// snapshots.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job tracker");
        self.root.cancel();
        self.registry.drain(self.config.cancel_timeout).await;
        tracing::info!("Job tracker shut down complete");
    }
}

/// Own one job's watcher and tailer for their whole life.
///
/// The tailer gets `drain_grace` after the watcher is done to store what
/// the engine still has buffered; then the scope is cancelled.
async fn supervise(
    watcher: JobWatcher,
    tailer: LogTailer,
    scope: CancellationToken,
    drain_grace: Duration,
) {
    let job_id = watcher.job().id.clone();
    let mut tail_task = tokio::spawn(tailer.run(scope.clone()));

    let (outcome, _) = watcher.run(scope.clone()).await;

    let tail_outcome = match tokio::time::timeout(drain_grace, &mut tail_task).await {
        Ok(joined) => joined,
        Err(_) => {
            scope.cancel();
            tail_task.await
        }
    };
    scope.cancel();

    match tail_outcome {
        Ok(tail) => tracing::debug!(job_id = %job_id, ?outcome, ?tail, "Job tracking scope closed"),
        Err(e) => tracing::error!(job_id = %job_id, ?outcome, error = %e, "Log tailer task failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use flowtrack_engine::testing::{event, finished_event, log_line, LogScript, ScriptedEngine, WatchScript};
    use flowtrack_store::MemoryKvStore;

    use super::*;

    fn tracker(engine: ScriptedEngine, config: TrackerConfig) -> (Arc<ScriptedEngine>, JobRecordStore, JobTracker) {
        let engine = Arc::new(engine);
        let records = JobRecordStore::new(Arc::new(MemoryKvStore::new()), Duration::from_secs(60));
        let tracker = JobTracker::new(engine.clone(), records.clone(), config);
        (engine, records, tracker)
    }

    fn fast_config() -> TrackerConfig {
        TrackerConfig {
            log_drain_grace: Duration::from_millis(200),
            cancel_timeout: Duration::from_secs(2),
            reopen: flowtrack_core::backoff::BackoffPolicy::immediate(),
            ..Default::default()
        }
    }

    async fn wait_until_idle(tracker: &JobTracker) {
        for _ in 0..200 {
            if tracker.registry().active().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("tracking did not finish");
    }

    #[tokio::test]
    async fn launch_persists_initial_status_before_returning() {
        let engine = ScriptedEngine::new()
            .with_watches([WatchScript::EventsThenHang(vec![])])
            .with_logs([LogScript::LinesThenHang(vec![])]);
        let (_, records, tracker) = tracker(engine, fast_config());

        tracker.launch("w1", vec!["build".into()]).await.unwrap();
        let job = records.load_status("w1").await.unwrap();
        assert_eq!(job.status, "Running");
        assert!(job.end_time.is_none());

        assert!(tracker.cancel("w1").await);
        assert!(records.load_status("w1").await.unwrap().end_time.is_some());
    }

    #[tokio::test]
    async fn finished_job_closes_scope_and_keeps_logs() {
        let now = chrono::Utc::now();
        let engine = ScriptedEngine::new()
            .with_watches([WatchScript::Events(vec![
                Ok(event("w1", "Running", &[("w1-1", "build")])),
                Ok(finished_event("w1", "Succeeded", &[("w1-1", "build")], now)),
            ])])
            .with_logs([LogScript::Lines(vec![Ok(log_line("w1-1", "compiling"))])]);
        let (_, records, tracker) = tracker(engine, fast_config());

        tracker.launch("w1", vec!["build".into()]).await.unwrap();
        wait_until_idle(&tracker).await;

        let job = records.load_status("w1").await.unwrap();
        assert_eq!(job.status, "Succeeded");
        assert!(job.end_time.is_some());
        let log = records.read_log("w1-1").await.unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].ends_with(" compiling"));
    }

    #[tokio::test]
    async fn shutdown_finalizes_every_job() {
        let engine = ScriptedEngine::new()
            .with_watches([WatchScript::EventsThenHang(vec![]), WatchScript::EventsThenHang(vec![])])
            .with_logs([LogScript::LinesThenHang(vec![]), LogScript::LinesThenHang(vec![])]);
        let (_, records, tracker) = tracker(engine, fast_config());

        tracker.launch("w1", vec![]).await.unwrap();
        tracker.launch("w2", vec![]).await.unwrap();
        tracker.shutdown().await;

        for id in ["w1", "w2"] {
            assert!(records.load_status(id).await.unwrap().end_time.is_some());
        }
        assert!(matches!(
            tracker.launch("w3", vec![]).await,
            Err(ServiceError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn relaunch_keeps_the_new_snapshot_live() {
        let engine = ScriptedEngine::new()
            .with_watches([WatchScript::EventsThenHang(vec![]), WatchScript::EventsThenHang(vec![])])
            .with_logs([LogScript::LinesThenHang(vec![]), LogScript::LinesThenHang(vec![])]);
        let (_, records, tracker) = tracker(engine, fast_config());

        tracker.launch("w1", vec![]).await.unwrap();
        tracker.launch("w1", vec!["build".into()]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let job = records.load_status("w1").await.unwrap();
        assert!(job.end_time.is_none());
        assert_eq!(job.phase_names, ["build"]);
        assert_eq!(tracker.registry().active().await, 1);

        tracker.shutdown().await;
    }

    #[tokio::test]
    async fn hanging_tailer_is_cut_off_after_grace() {
        let engine = ScriptedEngine::new()
            .with_watches([WatchScript::Events(vec![Ok(finished_event(
                "w1",
                "Failed",
                &[],
                chrono::Utc::now(),
            ))])])
            .with_logs([LogScript::LinesThenHang(vec![Ok(log_line("", "boom"))])]);
        let (_, records, tracker) = tracker(engine, fast_config());

        tracker.launch("w1", vec![]).await.unwrap();
        wait_until_idle(&tracker).await;

        assert_eq!(records.load_status("w1").await.unwrap().status, "Failed");
        // Lines without a pod name land under the job id.
        assert_eq!(records.read_log("w1").await.unwrap().len(), 1);
    }
}
