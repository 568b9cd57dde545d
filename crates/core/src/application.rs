//! Registered applications: named workflow definitions that jobs are
//! started from.
//!
//! An application is registered once with its full workflow. Starting a
//! job from it only varies the source branch, which is written into the
//! arguments of the first step of the first stage.

use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::phase::validate_workflow;
use crate::validation::validate_job_id;
use crate::workflow::Workflow;

/// Parameter that receives the branch when present by name.
pub const BRANCH_PARAMETER: &str = "branch";

/// Position of the branch parameter when none is named [`BRANCH_PARAMETER`].
const BRANCH_PARAMETER_INDEX: usize = 1;

/// Application ids follow the same rules as job ids.
pub fn validate_application_id(id: &str) -> Result<(), CoreError> {
    validate_job_id(id).map_err(|_| CoreError::Validation(format!("invalid application id '{id}'")))
}

/// Check that `workflow` may be registered under `id`.
///
/// The workflow must be trackable, must let the engine name its runs
/// (`metadata.generateName` equal to the id, trailing `-` ignored) and
/// must have a parameter the branch can go into.
pub fn validate_definition(id: &str, workflow: &Workflow) -> Result<(), CoreError> {
    validate_application_id(id)?;
    validate_workflow(workflow)?;

    let generate_name = workflow
        .metadata
        .generate_name
        .as_deref()
        .unwrap_or_default()
        .trim_end_matches('-');
    if generate_name != id {
        return Err(CoreError::Validation(format!(
            "application id '{id}' does not match workflow generateName '{generate_name}'"
        )));
    }

    with_branch(workflow, "validate").map(|_| ())
}

/// A copy of `workflow` with `branch` written into the branch parameter
/// of its first step.
///
/// The parameter named [`BRANCH_PARAMETER`] is used when there is one,
/// otherwise the second parameter.
pub fn with_branch(workflow: &Workflow, branch: &str) -> Result<Workflow, CoreError> {
    let mut workflow = workflow.clone();
    let step = workflow
        .spec
        .templates
        .iter_mut()
        .find(|t| !t.steps.is_empty())
        .and_then(|t| t.steps.first_mut())
        .and_then(|stage| stage.first_mut())
        .ok_or_else(|| CoreError::Validation("workflow has no first step".into()))?;

    let parameters = step
        .extra
        .get_mut("arguments")
        .and_then(Value::as_object_mut)
        .and_then(|args| args.get_mut("parameters"))
        .and_then(Value::as_array_mut)
        .ok_or_else(|| missing_branch_parameter(&step.name))?;

    let position = parameters
        .iter()
        .position(|p| p.get("name").and_then(Value::as_str) == Some(BRANCH_PARAMETER))
        .unwrap_or(BRANCH_PARAMETER_INDEX);
    let parameter: &mut Map<String, Value> = parameters
        .get_mut(position)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| missing_branch_parameter(&step.name))?;

    parameter.insert("value".into(), Value::String(branch.to_string()));
    Ok(workflow)
}

fn missing_branch_parameter(step: &str) -> CoreError {
    CoreError::Validation(format!(
        "first step '{step}' has no '{BRANCH_PARAMETER}' parameter and no second parameter"
    ))
}
