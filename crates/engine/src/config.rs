use std::time::Duration;

/// Connection settings for an Argo Workflows server.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the Argo server, e.g. `https://argo.internal:2746`.
    pub server_url: String,
    /// Namespace every workflow is submitted to and watched in.
    pub namespace: String,
    /// Service account injected into submitted workflows, when set.
    pub service_account: Option<String>,
    /// Bearer token sent with every request, when set.
    pub token: Option<String>,
    /// Accept self-signed server certificates.
    pub insecure_skip_verify: bool,
    /// Connect timeout. Streaming requests have no overall timeout.
    pub connect_timeout: Duration,
    /// Timeout for the one-shot submission request.
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:2746".into(),
            namespace: "default".into(),
            service_account: None,
            token: None,
            insecure_skip_verify: false,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `ARGO_SERVER_URL`           | `http://localhost:2746` |
    /// | `ARGO_NAMESPACE`            | `default`               |
    /// | `ARGO_SERVICE_ACCOUNT`      | unset                   |
    /// | `ARGO_TOKEN`                | unset                   |
    /// | `ARGO_INSECURE_SKIP_VERIFY` | `false`                 |
    /// | `ARGO_REQUEST_TIMEOUT_SECS` | `30`                    |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let server_url = std::env::var("ARGO_SERVER_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.server_url);

        let namespace = std::env::var("ARGO_NAMESPACE")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.namespace);

        let service_account = std::env::var("ARGO_SERVICE_ACCOUNT")
            .ok()
            .filter(|s| !s.is_empty());

        // Accept both a raw token and the `Bearer ...` form `argo auth token` prints.
        let token = std::env::var("ARGO_TOKEN")
            .ok()
            .map(|t| t.trim().trim_start_matches("Bearer ").to_string())
            .filter(|s| !s.is_empty());

        let insecure_skip_verify: bool = std::env::var("ARGO_INSECURE_SKIP_VERIFY")
            .unwrap_or_else(|_| "false".into())
            .parse()
            .expect("ARGO_INSECURE_SKIP_VERIFY must be true or false");

        let request_timeout_secs: u64 = std::env::var("ARGO_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("ARGO_REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            server_url,
            namespace,
            service_account,
            token,
            insecure_skip_verify,
            connect_timeout: defaults.connect_timeout,
            request_timeout: Duration::from_secs(request_timeout_secs),
        }
    }
}
