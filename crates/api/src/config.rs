//! HTTP listener settings, read once at startup.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use axum::http::HeaderValue;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Browser origins allowed to call the API with credentials.
    pub cors_origins: Vec<HeaderValue>,
    /// Requests still running after this get a 408.
    pub request_timeout: Duration,
    /// How long job tracking may take to write final snapshots once the
    /// listener has closed.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            cors_origins: vec![HeaderValue::from_static("http://localhost:5173")],
            request_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `HOST`, `PORT`, `CORS_ORIGINS` (comma
    /// separated), `REQUEST_TIMEOUT_SECS` and `SHUTDOWN_TIMEOUT_SECS`.
    ///
    /// Panics on malformed values; the process cannot start without them.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host: IpAddr = std::env::var("HOST")
            .map(|raw| raw.parse().expect("HOST must be an IP address"))
            .unwrap_or(defaults.listen.ip());
        let port: u16 = std::env::var("PORT")
            .map(|raw| raw.parse().expect("PORT must be a valid u16"))
            .unwrap_or(defaults.listen.port());

        let cors_origins = match std::env::var("CORS_ORIGINS") {
            Ok(raw) => parse_origins(&raw).unwrap_or_else(|e| panic!("CORS_ORIGINS: {e}")),
            Err(_) => defaults.cors_origins,
        };

        Self {
            listen: SocketAddr::new(host, port),
            cors_origins,
            request_timeout: secs_from_env("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.request_timeout),
            shutdown_grace: secs_from_env("SHUTDOWN_TIMEOUT_SECS").unwrap_or(defaults.shutdown_grace),
        }
    }
}

fn secs_from_env(name: &str) -> Option<Duration> {
    let raw = std::env::var(name).ok()?;
    let secs: u64 = raw
        .trim()
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a whole number of seconds"));
    Some(Duration::from_secs(secs))
}

/// Split a comma-separated origin list, skipping blank entries.
fn parse_origins(raw: &str) -> Result<Vec<HeaderValue>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| format!("invalid origin '{origin}': {e}"))
        })
        .collect()
}
