//! Registered application definitions on a [`KvStore`].
//!
//! Each application is one hash under `cicd:application:<id>` holding the
//! workflow JSON in `content` and the registration time in `updated_at`.
//! Unlike job records, applications never expire.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use flowtrack_core::workflow::Workflow;

use crate::error::StoreError;
use crate::kv::KvStore;

pub const APPLICATION_PREFIX: &str = "cicd:application:";

pub fn application_key(id: &str) -> String {
    format!("{APPLICATION_PREFIX}{id}")
}

#[derive(Clone)]
pub struct ApplicationStore {
    kv: Arc<dyn KvStore>,
}

impl ApplicationStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Register or replace the definition stored under `id`.
    pub async fn save(&self, id: &str, workflow: &Workflow) -> Result<(), StoreError> {
        let fields = [
            ("content".to_string(), serde_json::to_string(workflow)?),
            (
                "updated_at".to_string(),
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        ];
        self.kv.hash_set(&application_key(id), &fields, None).await
    }

    /// The definition registered under `id`.
    ///
    /// Returns [`StoreError::NotFound`] for unknown ids.
    pub async fn load(&self, id: &str) -> Result<Workflow, StoreError> {
        let key = application_key(id);
        let fields = self.kv.hash_get_all(&key).await?;
        let content = fields
            .get("content")
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;
        serde_json::from_str(content).map_err(|e| StoreError::Decode {
            key,
            reason: e.to_string(),
        })
    }

    /// Remove a definition. Returns whether it existed.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.kv.delete(&application_key(id)).await
    }

    /// Ids of every registered application, sorted.
    pub async fn list_ids(&self) -> Result<BTreeSet<String>, StoreError> {
        let keys = self.kv.scan_keys(&application_key("*")).await?;
        Ok(keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(APPLICATION_PREFIX).map(str::to_string))
            .filter(|id| !id.is_empty())
            .collect())
    }
}
