//! Phase model: a linear timeline derived from a steps workflow.
//!
//! Each stage of the steps template maps to exactly one phase, named
//! after the stage's first step. Stages with several parallel steps are
//! tracked through their first step only; [`multi_step_stages`] reports
//! what gets ignored so callers can say so out loud.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::job::PhaseStatus;
use crate::workflow::{NodeStatus, Workflow, WorkflowStatus};

/// Ordered phase names for a workflow, one per stage.
///
/// Returns an empty list when the workflow has no steps template or no
/// stages; such a job will never have phases tracked. Stages without
/// any step are skipped (and rejected up front by [`validate_workflow`]).
pub fn derive_phase_names(workflow: &Workflow) -> Vec<String> {
    workflow
        .steps_template()
        .map(|template| {
            template
                .steps
                .iter()
                .filter_map(|stage| stage.first())
                .map(|step| step.name.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Map every phase name to its current [`PhaseStatus`].
///
/// A phase gets the id of the execution node whose display name matches
/// it (pod nodes win over other node kinds, ties broken by node id).
/// All phases share the overall workflow phase as their status. The
/// result never contains keys outside `phase_names`.
pub fn resolve_phase_statuses(
    status: &WorkflowStatus,
    phase_names: &[String],
) -> BTreeMap<String, PhaseStatus> {
    phase_names
        .iter()
        .map(|name| {
            let phase = PhaseStatus {
                name: name.clone(),
                pod_name: find_node_for_phase(status, name)
                    .map(|(id, _)| id.to_string())
                    .unwrap_or_default(),
                status: status.phase.clone(),
            };
            (name.clone(), phase)
        })
        .collect()
}

fn find_node_for_phase<'a>(
    status: &'a WorkflowStatus,
    phase_name: &str,
) -> Option<(&'a str, &'a NodeStatus)> {
    let mut matches = status
        .nodes
        .iter()
        .filter(|(_, node)| node.display_name == phase_name)
        .map(|(id, node)| (id.as_str(), node));

    let first = matches.next()?;
    if first.1.is_pod() {
        return Some(first);
    }
    Some(matches.find(|(_, node)| node.is_pod()).unwrap_or(first))
}

/// Reject definitions the phase model cannot track.
///
/// A workflow needs a steps template with at least one stage, and every
/// stage needs at least one step to name its phase.
pub fn validate_workflow(workflow: &Workflow) -> Result<(), CoreError> {
    let template = workflow.steps_template().ok_or_else(|| {
        CoreError::Validation("workflow has no templates".to_string())
    })?;

    if template.steps.is_empty() {
        return Err(CoreError::Validation(format!(
            "template '{}' has no steps",
            template.name
        )));
    }

    if let Some(index) = template.steps.iter().position(|stage| stage.is_empty()) {
        return Err(CoreError::Validation(format!(
            "stage {index} of template '{}' has no steps",
            template.name
        )));
    }

    if let Some(index) = template
        .steps
        .iter()
        .position(|stage| stage[0].name.trim().is_empty())
    {
        return Err(CoreError::Validation(format!(
            "stage {index} of template '{}' has an unnamed first step",
            template.name
        )));
    }

    let names = derive_phase_names(workflow);
    for (i, name) in names.iter().enumerate() {
        if name.contains(',') {
            return Err(CoreError::Validation(format!(
                "phase name '{name}' must not contain ','"
            )));
        }
        if names[..i].contains(name) {
            return Err(CoreError::Validation(format!(
                "phase name '{name}' is used by more than one stage"
            )));
        }
    }

    Ok(())
}

/// Stages whose extra parallel steps are not tracked, as
/// `(stage index, ignored step names)`.
pub fn multi_step_stages(workflow: &Workflow) -> Vec<(usize, Vec<String>)> {
    let Some(template) = workflow.steps_template() else {
        return Vec::new();
    };
    template
        .steps
        .iter()
        .enumerate()
        .filter(|(_, stage)| stage.len() > 1)
        .map(|(index, stage)| (index, stage[1..].iter().map(|s| s.name.clone()).collect()))
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::workflow::{Template, WorkflowSpec, WorkflowStep};

    fn step(name: &str) -> WorkflowStep {
        WorkflowStep {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn workflow(stages: Vec<Vec<&str>>) -> Workflow {
        Workflow {
            spec: WorkflowSpec {
                templates: vec![Template {
                    name: "main".into(),
                    steps: stages
                        .into_iter()
                        .map(|stage| stage.into_iter().map(step).collect())
                        .collect(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn node(display_name: &str, node_type: &str) -> NodeStatus {
        NodeStatus {
            id: String::new(),
            display_name: display_name.to_string(),
            node_type: Some(node_type.to_string()),
            phase: None,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn derives_one_name_per_stage_in_order() {
        let wf = workflow(vec![vec!["checkout"], vec!["build"], vec!["deploy"]]);
        assert_eq!(derive_phase_names(&wf), names(&["checkout", "build", "deploy"]));
    }

    #[test]
    fn derives_first_step_of_parallel_stage() {
        let wf = workflow(vec![vec!["lint", "test"], vec!["build"]]);
        assert_eq!(derive_phase_names(&wf), names(&["lint", "build"]));
        assert_eq!(multi_step_stages(&wf), vec![(0, names(&["test"]))]);
    }

    #[test]
    fn no_templates_yields_no_phases() {
        assert!(derive_phase_names(&Workflow::default()).is_empty());
        assert!(multi_step_stages(&Workflow::default()).is_empty());
    }

    #[test]
    fn entrypoint_selects_the_steps_template() {
        let mut wf = workflow(vec![vec!["checkout"]]);
        wf.spec.templates.insert(
            0,
            Template {
                name: "helper".into(),
                ..Default::default()
            },
        );
        wf.spec.entrypoint = Some("main".into());
        assert_eq!(derive_phase_names(&wf), names(&["checkout"]));
    }

    #[test]
    fn resolves_pod_name_by_display_name() {
        let mut status = WorkflowStatus {
            phase: "Running".into(),
            ..Default::default()
        };
        status.nodes.insert("w1-100".into(), node("checkout", "Pod"));
        status.nodes.insert("w1".into(), node("w1", "Steps"));

        let phases = resolve_phase_statuses(&status, &names(&["checkout", "build"]));

        assert_eq!(phases.len(), 2);
        assert_eq!(phases["checkout"].pod_name, "w1-100");
        assert_eq!(phases["checkout"].status, "Running");
        assert_eq!(phases["build"].pod_name, "");
        assert_eq!(phases["build"].status, "Running");
    }

    #[test]
    fn prefers_pod_nodes_over_retry_wrappers() {
        let mut status = WorkflowStatus::default();
        status.nodes.insert("w1-1".into(), node("build", "Retry"));
        status.nodes.insert("w1-2".into(), node("build", "Pod"));

        let phases = resolve_phase_statuses(&status, &names(&["build"]));
        assert_eq!(phases["build"].pod_name, "w1-2");
    }

    #[test]
    fn resolved_keys_never_leave_phase_names() {
        let mut status = WorkflowStatus::default();
        status.nodes.insert("w1-9".into(), node("unrelated", "Pod"));
        let phase_names = names(&["a", "b"]);

        let phases = resolve_phase_statuses(&status, &phase_names);
        assert!(phases.keys().all(|k| phase_names.contains(k)));
    }

    #[test]
    fn validate_accepts_single_step_stages() {
        let wf = workflow(vec![vec!["checkout"], vec!["build"]]);
        assert!(validate_workflow(&wf).is_ok());
    }

    #[test]
    fn validate_rejects_missing_stages() {
        assert_matches!(
            validate_workflow(&Workflow::default()),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            validate_workflow(&workflow(vec![])),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn validate_rejects_empty_stage() {
        let wf = workflow(vec![vec!["checkout"], vec![]]);
        assert_matches!(validate_workflow(&wf), Err(CoreError::Validation(msg)) if msg.contains("stage 1"));
    }

    #[test]
    fn validate_rejects_duplicate_and_comma_names() {
        let dup = workflow(vec![vec!["build"], vec!["build"]]);
        assert_matches!(validate_workflow(&dup), Err(CoreError::Validation(_)));

        let comma = workflow(vec![vec!["a,b"]]);
        assert_matches!(validate_workflow(&comma), Err(CoreError::Validation(_)));
    }
}
