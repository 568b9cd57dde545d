//! HTTP client for the Argo Workflows server.
//!
//! Wraps the three endpoints the tracker needs (create, watch events,
//! follow logs) using [`reqwest`]. Streaming responses are split into
//! lines with a [`LinesCodec`] and parsed frame by frame.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{future, StreamExt, TryStreamExt};
use reqwest::{RequestBuilder, StatusCode};
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;

use flowtrack_core::types::JobId;
use flowtrack_core::workflow::Workflow;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::messages::{parse_event_line, parse_log_line, ErrorFrame, GRPC_NOT_FOUND};
use crate::{EventStream, LogStream, WorkflowEngine};

/// Upper bound on a single NDJSON frame. Workflow snapshots with many
/// nodes get large, but not this large.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// [`WorkflowEngine`] backed by an Argo server.
pub struct ArgoClient {
    client: reqwest::Client,
    config: EngineConfig,
}

impl ArgoClient {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        if config.server_url.is_empty() {
            return Err(EngineError::Config("server URL must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// A copy of `workflow` placed in the configured namespace, with the
    /// configured service account (if any) injected.
    pub fn prepare(&self, workflow: &Workflow) -> Workflow {
        let mut prepared = workflow.clone();
        prepared.metadata.namespace = Some(self.config.namespace.clone());
        if let Some(account) = &self.config.service_account {
            prepared.spec.service_account_name = Some(account.clone());
        }
        prepared
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.config.server_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a streaming request and split the body into non-empty lines.
    async fn open_lines(
        &self,
        request: RequestBuilder,
    ) -> Result<BoxStream<'static, Result<String, EngineError>>, EngineError> {
        let response = self.authorized(request).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(ndjson_lines(response))
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Missing workflows
    /// map to [`EngineError::NotFound`], everything else to
    /// [`EngineError::Api`].
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        let frame = serde_json::from_str::<ErrorFrame>(&body).ok();
        if status == StatusCode::NOT_FOUND || frame.as_ref().is_some_and(|f| f.code == GRPC_NOT_FOUND) {
            let message = frame.map(|f| f.message).unwrap_or(body);
            return Err(EngineError::NotFound(message));
        }
        Err(EngineError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| EngineError::Decode(e.to_string()))
    }
}

fn ndjson_lines(response: reqwest::Response) -> BoxStream<'static, Result<String, EngineError>> {
    let bytes = response.bytes_stream().map_err(std::io::Error::other);
    FramedRead::new(
        StreamReader::new(bytes),
        LinesCodec::new_with_max_length(MAX_FRAME_BYTES),
    )
    .map_err(|e| EngineError::Stream(e.to_string()))
    .try_filter(|line| future::ready(!line.trim().is_empty()))
    .boxed()
}

#[async_trait]
impl WorkflowEngine for ArgoClient {
    async fn submit_workflow(&self, workflow: &Workflow) -> Result<JobId, EngineError> {
        let namespace = &self.config.namespace;
        let body = serde_json::json!({
            "namespace": namespace,
            "workflow": self.prepare(workflow),
        });

        let request = self
            .client
            .post(self.url(&format!("workflows/{namespace}")))
            .timeout(self.config.request_timeout)
            .json(&body);
        let response = self.authorized(request).send().await?;
        let created: Workflow = Self::parse_response(response).await?;

        let name = created
            .name()
            .ok_or_else(|| EngineError::Decode("created workflow has no name".into()))?
            .to_string();
        tracing::debug!(job_id = %name, namespace = %namespace, "Workflow submitted");
        Ok(name)
    }

    async fn watch_workflow(&self, job_id: &str) -> Result<EventStream, EngineError> {
        let namespace = &self.config.namespace;
        let request = self
            .client
            .get(self.url(&format!("workflow-events/{namespace}")))
            .query(&[(
                "listOptions.fieldSelector",
                format!("metadata.name={job_id}"),
            )]);

        let lines = self.open_lines(request).await?;
        tracing::debug!(job_id, "Workflow watch opened");
        Ok(lines
            .try_filter_map(|line| future::ready(parse_event_line(&line)))
            .boxed())
    }

    async fn stream_logs(&self, job_id: &str, container: &str) -> Result<LogStream, EngineError> {
        let namespace = &self.config.namespace;
        let request = self
            .client
            .get(self.url(&format!("workflows/{namespace}/{job_id}/log")))
            .query(&[
                ("logOptions.container", container),
                ("logOptions.follow", "true"),
            ]);

        let lines = self.open_lines(request).await?;
        tracing::debug!(job_id, container, "Workflow log stream opened");
        Ok(lines
            .try_filter_map(|line| future::ready(parse_log_line(&line)))
            .boxed())
    }
}
