//! Per-job watcher: follows the engine's change events for one workflow
//! and keeps the job's persisted snapshot current.
//!
//! Lifecycle: [`JobWatcher::start`] persists the initial snapshot
//! (Starting), [`JobWatcher::run`] consumes events and re-opens the watch
//! whenever the server closes it cleanly (Watching / Reconnecting), and
//! always ends by persisting the final snapshot exactly once (Terminal),
//! whether the job finished, the watch failed, the scope was cancelled
//! or the event loop panicked.
//!
//! A watcher is the only writer of its job's status and phase records.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::{FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;

use flowtrack_core::backoff::BackoffPolicy;
use flowtrack_core::job::JobRecord;
use flowtrack_core::phase::resolve_phase_statuses;
use flowtrack_engine::{WorkflowEngine, WorkflowEvent};
use flowtrack_store::{JobRecordStore, StoreError};

/// How watching ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The engine reported the workflow finished.
    Finished,
    /// The workflow was already gone when the watch was first opened.
    NotFound,
    /// Opening or reading the watch failed, or the loop panicked.
    Failed,
    /// The tracking scope was cancelled.
    Cancelled,
}

pub struct JobWatcher {
    engine: Arc<dyn WorkflowEngine>,
    records: JobRecordStore,
    reopen: BackoffPolicy,
    job: JobRecord,
}

impl JobWatcher {
    /// Record the job as started and running, and persist that snapshot.
    ///
    /// Fails when the initial snapshot cannot be written; nothing is
    /// tracked in that case.
    pub async fn start(
        engine: Arc<dyn WorkflowEngine>,
        records: JobRecordStore,
        reopen: BackoffPolicy,
        job_id: &str,
        phase_names: Vec<String>,
    ) -> Result<Self, StoreError> {
        let job = JobRecord::started(job_id, phase_names, Utc::now());
        records.save_status(&job).await?;
        tracing::debug!(job_id, phases = job.phase_names.len(), "Job tracking started");

        Ok(Self {
            engine,
            records,
            reopen,
            job,
        })
    }

    pub fn job(&self) -> &JobRecord {
        &self.job
    }

    /// Watch until the job finishes, the watch fails or `cancel` fires,
    /// then persist the final snapshot.
    pub async fn run(mut self, cancel: CancellationToken) -> (WatchOutcome, JobRecord) {
        let job_id = self.job.id.clone();
        let outcome = {
            let watching = AssertUnwindSafe(self.watch()).catch_unwind();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => WatchOutcome::Cancelled,
                result = watching => result.unwrap_or_else(|_| {
                    tracing::error!(job_id = %job_id, "Job watcher panicked");
                    WatchOutcome::Failed
                }),
            }
        };

        self.finish(outcome).await;
        (outcome, self.job)
    }

    async fn watch(&mut self) -> WatchOutcome {
        let mut backoff = self.reopen.start();
        let mut reopening = false;

        loop {
            let mut stream = match self.engine.watch_workflow(&self.job.id).await {
                Ok(stream) => stream,
                Err(e) if e.is_not_found() && !reopening => {
                    tracing::debug!(job_id = %self.job.id, "Workflow not found, nothing to watch");
                    return WatchOutcome::NotFound;
                }
                Err(e) => {
                    tracing::error!(job_id = %self.job.id, reopening, error = %e, "Failed to open workflow watch");
                    return WatchOutcome::Failed;
                }
            };

            while let Some(item) = stream.next().await {
                match item {
                    Ok(event) => {
                        backoff.reset();
                        if self.observe(event).await {
                            return WatchOutcome::Finished;
                        }
                    }
                    Err(e) => {
                        tracing::error!(job_id = %self.job.id, error = %e, "Workflow watch failed");
                        return WatchOutcome::Failed;
                    }
                }
            }

            let wait = backoff.next_wait();
            tracing::debug!(
                job_id = %self.job.id,
                wait_ms = wait.as_millis() as u64,
                idle_reopens = backoff.waits(),
                "Workflow watch ended, re-establishing",
            );
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            reopening = true;
        }
    }

    /// Apply one event. Returns whether the workflow has finished.
    async fn observe(&mut self, event: WorkflowEvent) -> bool {
        let Some(workflow) = event.object else {
            return false;
        };
        let status = &workflow.status;

        let phases = resolve_phase_statuses(status, &self.job.phase_names);
        if !self.job.phase_names.is_empty() {
            if let Err(e) = self
                .records
                .save_phase(&self.job.id, &self.job.phase_names, &phases)
                .await
            {
                tracing::warn!(job_id = %self.job.id, error = %e, "Failed to save job phases");
            }
        }
        self.job.set_phases(phases);

        if !status.phase.is_empty() && status.phase != self.job.status {
            self.job.status = status.phase.clone();
            if let Err(e) = self.records.save_status(&self.job).await {
                tracing::warn!(job_id = %self.job.id, error = %e, "Failed to save job status");
            }
            tracing::info!(job_id = %self.job.id, status = %self.job.status, "Job status changed");
        }

        status.is_finished()
    }

    async fn finish(&mut self, outcome: WatchOutcome) {
        self.job.finish(Utc::now());
        match self.records.save_status(&self.job).await {
            Ok(()) => tracing::info!(
                job_id = %self.job.id,
                status = %self.job.status,
                cost = %self.job.cost,
                ?outcome,
                "Job tracking finished",
            ),
            Err(e) => tracing::error!(
                job_id = %self.job.id,
                ?outcome,
                error = %e,
                "Failed to save final job status",
            ),
        }
    }
}
