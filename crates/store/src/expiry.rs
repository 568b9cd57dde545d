//! Periodic removal of expired keys.
//!
//! Reads already ignore expired keys; this task only reclaims the space
//! they take up. Spawn it with `tokio::spawn` and stop it through the
//! [`CancellationToken`].

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::kv::KvStore;

/// Run the purge loop until `cancel` is triggered.
pub async fn run(store: Arc<dyn KvStore>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Record expiry job started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Record expiry job stopping");
                break;
            }
            _ = ticker.tick() => {
                match store.purge_expired().await {
                    Ok(0) => tracing::debug!("Record expiry: nothing to purge"),
                    Ok(purged) => tracing::info!(purged, "Record expiry: purged expired keys"),
                    Err(e) => tracing::error!(error = %e, "Record expiry: purge failed"),
                }
            }
        }
    }
}
