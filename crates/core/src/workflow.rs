//! The subset of the Argo `Workflow` object the tracker reads and writes.
//!
//! Only the fields the phase model and the watcher rely on are typed.
//! Everything else is captured in flattened `extra` maps so that a
//! definition submitted through the API reaches the engine unchanged
//! (apart from the fields the service injects on purpose).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::Timestamp;

/// An Argo workflow: definition (`spec`) plus live state (`status`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: WorkflowSpec,
    #[serde(default, skip_serializing_if = "WorkflowStatus::is_empty")]
    pub status: WorkflowStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A workflow template. Only `steps` templates contribute phases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub name: String,
    /// Ordered stages; each stage is a group of steps run in parallel.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<ParallelSteps>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One stage of a steps template. Argo encodes it as a bare JSON array.
pub type ParallelSteps = Vec<WorkflowStep>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Live execution state reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    /// Overall workflow phase (`Pending`, `Running`, `Succeeded`, ...).
    #[serde(default)]
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// Set once the workflow reached a terminal phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    /// Execution nodes keyed by node id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<String, NodeStatus>,
}

impl WorkflowStatus {
    pub fn is_empty(&self) -> bool {
        self.phase.is_empty()
            && self.started_at.is_none()
            && self.finished_at.is_none()
            && self.nodes.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl NodeStatus {
    pub fn is_pod(&self) -> bool {
        self.node_type.as_deref() == Some("Pod")
    }
}

impl Workflow {
    /// The workflow name, once the engine has assigned one.
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref().filter(|n| !n.is_empty())
    }

    /// The template whose stages define the phase timeline.
    ///
    /// Uses `spec.entrypoint` when it names a known template, otherwise
    /// the first template.
    pub fn steps_template(&self) -> Option<&Template> {
        let templates = &self.spec.templates;
        self.spec
            .entrypoint
            .as_deref()
            .and_then(|entry| templates.iter().find(|t| t.name == entry))
            .or_else(|| templates.first())
    }
}
