//! Argo server streaming message types and parser.
//!
//! Streaming endpoints answer with newline-delimited JSON. Every line is
//! either `{"result": {...}}` or `{"error": {"code": N, "message": "..."}}`
//! (older servers spell the code `grpc_code`). Watch results carry
//! `{"type", "object"}`; log results carry `{"content", "podName"}`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use flowtrack_core::workflow::Workflow;

use crate::error::EngineError;

/// gRPC status code the server uses for missing workflows.
pub const GRPC_NOT_FOUND: i32 = 5;

/// One change notification for a watched workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// `ADDED`, `MODIFIED` or `DELETED`.
    #[serde(rename = "type", default)]
    pub event_type: String,
    /// Full workflow snapshot. Absent on keep-alive frames.
    #[serde(default)]
    pub object: Option<Workflow>,
}

impl WorkflowEvent {
    pub fn modified(workflow: Workflow) -> Self {
        Self {
            event_type: "MODIFIED".into(),
            object: Some(workflow),
        }
    }
}

/// One line of container output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Pod that produced the line; may be empty.
    #[serde(default)]
    pub pod_name: String,
    #[serde(default)]
    pub content: String,
}

/// Error payload of a stream frame or of a non-2xx response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorFrame {
    #[serde(default, alias = "grpc_code")]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl ErrorFrame {
    pub fn into_error(self) -> EngineError {
        if self.code == GRPC_NOT_FOUND {
            EngineError::NotFound(self.message)
        } else {
            EngineError::Stream(format!("code {}: {}", self.code, self.message))
        }
    }
}

#[derive(Debug, Deserialize)]
struct Frame<T> {
    result: Option<T>,
    error: Option<ErrorFrame>,
}

fn parse_frame<T: DeserializeOwned>(line: &str) -> Result<Option<T>, EngineError> {
    let frame: Frame<T> =
        serde_json::from_str(line).map_err(|e| EngineError::Decode(e.to_string()))?;
    if let Some(error) = frame.error {
        return Err(error.into_error());
    }
    Ok(frame.result)
}

/// Parse one line of the workflow-events stream.
///
/// Returns `Ok(None)` for frames carrying neither a result nor an error.
pub fn parse_event_line(line: &str) -> Result<Option<WorkflowEvent>, EngineError> {
    parse_frame(line)
}

/// Parse one line of the workflow log stream.
pub fn parse_log_line(line: &str) -> Result<Option<LogEntry>, EngineError> {
    parse_frame(line)
}
