//! Scripted in-process engine for test suites.
//!
//! Each call to [`WorkflowEngine::watch_workflow`] pops the next
//! [`WatchScript`]; once the script runs out, further opens fail with
//! [`EngineError::NotFound`]. Log streams are scripted the same way.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use flowtrack_core::types::{JobId, Timestamp};
use flowtrack_core::workflow::{NodeStatus, Workflow, WorkflowStatus};

use crate::error::EngineError;
use crate::messages::{LogEntry, WorkflowEvent};
use crate::{EventStream, LogStream, WorkflowEngine};

/// What one opened watch does.
pub enum WatchScript {
    /// Opening fails with this error.
    Fail(EngineError),
    /// Yields these items, then ends cleanly.
    Events(Vec<Result<WorkflowEvent, EngineError>>),
    /// Yields these items, then never produces anything again.
    EventsThenHang(Vec<Result<WorkflowEvent, EngineError>>),
}

/// What one opened log stream does.
pub enum LogScript {
    Fail(EngineError),
    Lines(Vec<Result<LogEntry, EngineError>>),
    LinesThenHang(Vec<Result<LogEntry, EngineError>>),
}

#[derive(Default)]
pub struct ScriptedEngine {
    watches: Mutex<VecDeque<WatchScript>>,
    logs: Mutex<VecDeque<LogScript>>,
    submitted: Mutex<Vec<Workflow>>,
    submit_error: Mutex<Option<EngineError>>,
    watch_opens: AtomicUsize,
    log_opens: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_watches(self, scripts: impl IntoIterator<Item = WatchScript>) -> Self {
        self.push_watches(scripts);
        self
    }

    pub fn with_logs(self, scripts: impl IntoIterator<Item = LogScript>) -> Self {
        lock(&self.logs).extend(scripts);
        self
    }

    pub fn push_watches(&self, scripts: impl IntoIterator<Item = WatchScript>) {
        lock(&self.watches).extend(scripts);
    }

    /// Make the next submission fail.
    pub fn fail_next_submit(&self, error: EngineError) {
        *lock(&self.submit_error) = Some(error);
    }

    pub fn submitted(&self) -> Vec<Workflow> {
        lock(&self.submitted).clone()
    }

    pub fn watch_opens(&self) -> usize {
        self.watch_opens.load(Ordering::SeqCst)
    }

    pub fn log_opens(&self) -> usize {
        self.log_opens.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl WorkflowEngine for ScriptedEngine {
    async fn submit_workflow(&self, workflow: &Workflow) -> Result<JobId, EngineError> {
        if let Some(error) = lock(&self.submit_error).take() {
            return Err(error);
        }
        let mut submitted = lock(&self.submitted);
        let name = match workflow.name() {
            Some(name) => name.to_string(),
            None => {
                let prefix = workflow.metadata.generate_name.as_deref().unwrap_or("wf-");
                format!("{prefix}{:05}", submitted.len() + 1)
            }
        };
        let mut stored = workflow.clone();
        stored.metadata.name = Some(name.clone());
        submitted.push(stored);
        Ok(name)
    }

    async fn watch_workflow(&self, job_id: &str) -> Result<EventStream, EngineError> {
        self.watch_opens.fetch_add(1, Ordering::SeqCst);
        match lock(&self.watches).pop_front() {
            None => Err(EngineError::NotFound(job_id.to_string())),
            Some(WatchScript::Fail(error)) => Err(error),
            Some(WatchScript::Events(items)) => Ok(stream::iter(items).boxed()),
            Some(WatchScript::EventsThenHang(items)) => {
                Ok(stream::iter(items).chain(stream::pending()).boxed())
            }
        }
    }

    async fn stream_logs(&self, job_id: &str, _container: &str) -> Result<LogStream, EngineError> {
        self.log_opens.fetch_add(1, Ordering::SeqCst);
        match lock(&self.logs).pop_front() {
            None => Err(EngineError::NotFound(job_id.to_string())),
            Some(LogScript::Fail(error)) => Err(error),
            Some(LogScript::Lines(items)) => Ok(stream::iter(items).boxed()),
            Some(LogScript::LinesThenHang(items)) => {
                Ok(stream::iter(items).chain(stream::pending()).boxed())
            }
        }
    }
}

/// A watch event for workflow `name` in `phase`, with one pod node per
/// `(node id, display name)` pair.
pub fn event(name: &str, phase: &str, pods: &[(&str, &str)]) -> WorkflowEvent {
    let mut workflow = Workflow::default();
    workflow.metadata.name = Some(name.to_string());
    workflow.status = WorkflowStatus {
        phase: phase.to_string(),
        nodes: pods
            .iter()
            .map(|(id, display)| {
                (
                    id.to_string(),
                    NodeStatus {
                        id: id.to_string(),
                        display_name: display.to_string(),
                        node_type: Some("Pod".into()),
                        phase: Some(phase.to_string()),
                    },
                )
            })
            .collect(),
        ..Default::default()
    };
    WorkflowEvent::modified(workflow)
}

/// Like [`event`], marked finished at `at`.
pub fn finished_event(
    name: &str,
    phase: &str,
    pods: &[(&str, &str)],
    at: Timestamp,
) -> WorkflowEvent {
    let mut event = event(name, phase, pods);
    if let Some(workflow) = event.object.as_mut() {
        workflow.status.finished_at = Some(at);
    }
    event
}

pub fn log_line(pod_name: &str, content: &str) -> LogEntry {
    LogEntry {
        pod_name: pod_name.to_string(),
        content: content.to_string(),
    }
}
