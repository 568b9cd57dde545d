/// Errors from the workflow engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The workflow does not exist (HTTP 404 or gRPC code 5).
    #[error("Workflow not found: {0}")]
    NotFound(String),

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine returned a non-2xx status code.
    #[error("Engine API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A response or stream frame could not be decoded.
    #[error("Failed to decode engine message: {0}")]
    Decode(String),

    /// A streaming response broke off or carried an error frame.
    #[error("Engine stream error: {0}")]
    Stream(String),

    /// The client could not be built from its configuration.
    #[error("Invalid engine configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}
