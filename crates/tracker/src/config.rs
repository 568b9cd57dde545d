use std::time::Duration;

use flowtrack_core::backoff::BackoffPolicy;

/// Tracking behaviour, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Container whose output the log tailer follows.
    pub log_container: String,
    /// How long the tailer may keep draining after the watcher finished.
    pub log_drain_grace: Duration,
    /// Whether deleting a job stops its in-flight tracking first.
    pub cancel_on_delete: bool,
    /// Upper bound on waiting for a cancelled job's tasks to exit.
    pub cancel_timeout: Duration,
    /// Pacing of watch re-opens after a clean end of stream.
    pub reopen: BackoffPolicy,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            log_container: "main".into(),
            log_drain_grace: Duration::from_secs(5),
            cancel_on_delete: true,
            cancel_timeout: Duration::from_secs(10),
            reopen: BackoffPolicy::default(),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `LOG_CONTAINER`           | `main`  |
    /// | `LOG_DRAIN_GRACE_SECS`    | `5`     |
    /// | `CANCEL_ON_DELETE`        | `true`  |
    /// | `CANCEL_TIMEOUT_SECS`     | `10`    |
    /// | `WATCH_REOPEN_INITIAL_MS` | `250`   |
    /// | `WATCH_REOPEN_MAX_SECS`   | `30`    |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let log_container = std::env::var("LOG_CONTAINER")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.log_container);

        let log_drain_grace_secs: u64 = std::env::var("LOG_DRAIN_GRACE_SECS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("LOG_DRAIN_GRACE_SECS must be a valid u64");

        let cancel_on_delete: bool = std::env::var("CANCEL_ON_DELETE")
            .unwrap_or_else(|_| "true".into())
            .parse()
            .expect("CANCEL_ON_DELETE must be true or false");

        let cancel_timeout_secs: u64 = std::env::var("CANCEL_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("CANCEL_TIMEOUT_SECS must be a valid u64");

        let reopen_initial_ms: u64 = std::env::var("WATCH_REOPEN_INITIAL_MS")
            .unwrap_or_else(|_| "250".into())
            .parse()
            .expect("WATCH_REOPEN_INITIAL_MS must be a valid u64");

        let reopen_max_secs: u64 = std::env::var("WATCH_REOPEN_MAX_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("WATCH_REOPEN_MAX_SECS must be a valid u64");

        Self {
            log_container,
            log_drain_grace: Duration::from_secs(log_drain_grace_secs),
            cancel_on_delete,
            cancel_timeout: Duration::from_secs(cancel_timeout_secs),
            reopen: BackoffPolicy {
                first: Duration::from_millis(reopen_initial_ms),
                ceiling: Duration::from_secs(reopen_max_secs),
                factor: defaults.reopen.factor,
            },
        }
    }
}
