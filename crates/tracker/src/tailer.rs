//! Log tailer: follows a job's container output and appends every line
//! to the log of the pod that produced it.
//!
//! Unlike the watcher it never re-opens its stream. End of stream or a
//! stream error ends it for good.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use flowtrack_engine::WorkflowEngine;
use flowtrack_store::records::format_log_line;
use flowtrack_store::JobRecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailOutcome {
    /// The stream ended cleanly.
    Ended,
    /// The stream could not be opened or broke off.
    Failed,
    Cancelled,
}

pub struct LogTailer {
    engine: Arc<dyn WorkflowEngine>,
    records: JobRecordStore,
    job_id: String,
    container: String,
}

impl LogTailer {
    pub fn new(
        engine: Arc<dyn WorkflowEngine>,
        records: JobRecordStore,
        job_id: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            records,
            job_id: job_id.into(),
            container: container.into(),
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> TailOutcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(job_id = %self.job_id, "Log tailer cancelled");
                TailOutcome::Cancelled
            }
            outcome = self.tail() => outcome,
        }
    }

    async fn tail(&self) -> TailOutcome {
        let mut stream = match self.engine.stream_logs(&self.job_id, &self.container).await {
            Ok(stream) => stream,
            Err(e) if e.is_not_found() => {
                tracing::debug!(job_id = %self.job_id, "No logs to follow, workflow not found");
                return TailOutcome::Failed;
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "Failed to open log stream");
                return TailOutcome::Failed;
            }
        };

        let mut appended = 0u64;
        while let Some(item) = stream.next().await {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(job_id = %self.job_id, appended, error = %e, "Log stream failed");
                    return TailOutcome::Failed;
                }
            };

            let unit_id = if entry.pod_name.is_empty() {
                self.job_id.as_str()
            } else {
                entry.pod_name.as_str()
            };
            let line = format_log_line(Utc::now(), &entry.content);
            if let Err(e) = self.records.append_log(unit_id, &line).await {
                tracing::warn!(job_id = %self.job_id, unit_id, error = %e, "Failed to save log line");
                continue;
            }
            appended += 1;
        }

        tracing::debug!(job_id = %self.job_id, appended, "Log stream ended");
        TailOutcome::Ended
    }
}
