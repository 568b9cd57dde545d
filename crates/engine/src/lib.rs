//! Workflow engine client.
//!
//! [`WorkflowEngine`] is the seam the tracker observes jobs through:
//! submit a workflow, watch its change events, follow its logs. The
//! production implementation is [`ArgoClient`], which talks to the Argo
//! Workflows server over HTTP and consumes its newline-delimited JSON
//! streams.

pub mod client;
pub mod config;
pub mod error;
pub mod messages;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use async_trait::async_trait;
use futures::stream::BoxStream;

use flowtrack_core::types::JobId;
use flowtrack_core::workflow::Workflow;

pub use client::ArgoClient;
pub use config::EngineConfig;
pub use error::EngineError;
pub use messages::{LogEntry, WorkflowEvent};

/// Change events of one workflow. Ends cleanly when the server closes
/// the watch; callers re-open it.
pub type EventStream = BoxStream<'static, Result<WorkflowEvent, EngineError>>;

/// Log lines of one workflow's pods.
pub type LogStream = BoxStream<'static, Result<LogEntry, EngineError>>;

#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Submit a workflow and return the name the engine assigned to it.
    async fn submit_workflow(&self, workflow: &Workflow) -> Result<JobId, EngineError>;

    /// Open a watch on one workflow. Fails with [`EngineError::NotFound`]
    /// when the workflow does not exist.
    async fn watch_workflow(&self, job_id: &str) -> Result<EventStream, EngineError>;

    /// Follow the logs of `container` across all pods of a workflow.
    async fn stream_logs(&self, job_id: &str, container: &str) -> Result<LogStream, EngineError>;
}
