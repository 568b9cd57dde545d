//! Input validation applied before any store or engine access.

use validator::{Validate, ValidationError};

use crate::error::CoreError;

/// A job id as received from a caller.
#[derive(Debug, Validate)]
pub struct JobIdInput {
    #[validate(length(min = 3, max = 100), custom(function = "validate_id_chars"))]
    pub id: String,
}

/// Characters that would let an id escape its key or act as a glob.
const FORBIDDEN_ID_CHARS: [char; 5] = [':', '*', '?', '[', ']'];

fn validate_id_chars(id: &str) -> Result<(), ValidationError> {
    if id.chars().any(|c| c.is_whitespace() || FORBIDDEN_ID_CHARS.contains(&c)) {
        return Err(ValidationError::new("invalid_job_id_chars"));
    }
    Ok(())
}

/// Validate a job id (3..=100 characters, no key separators, globs or
/// whitespace).
pub fn validate_job_id(id: &str) -> Result<(), CoreError> {
    JobIdInput { id: id.to_string() }
        .validate()
        .map_err(|e| CoreError::Validation(format!("invalid job id '{id}': {e}")))
}

/// Validate an execution-unit id used to address a log stream.
pub fn validate_unit_id(id: &str) -> Result<(), CoreError> {
    if id.is_empty() || id.len() > 253 {
        return Err(CoreError::Validation(format!(
            "invalid execution unit id '{id}'"
        )));
    }
    validate_id_chars(id)
        .map_err(|_| CoreError::Validation(format!("invalid execution unit id '{id}'")))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn accepts_engine_style_names() {
        assert!(validate_job_id("ci-pipeline-x7k2p").is_ok());
        assert!(validate_job_id("w1.abc").is_ok());
    }

    #[test]
    fn rejects_short_and_long_ids() {
        assert_matches!(validate_job_id("ab"), Err(CoreError::Validation(_)));
        assert_matches!(validate_job_id(""), Err(CoreError::Validation(_)));
        let long = "x".repeat(101);
        assert_matches!(validate_job_id(&long), Err(CoreError::Validation(_)));
        assert!(validate_job_id(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn rejects_separators_and_globs() {
        for bad in ["ci:job", "ci-*", "job?", "a b c"] {
            assert_matches!(validate_job_id(bad), Err(CoreError::Validation(_)), "{bad}");
        }
    }

    #[test]
    fn unit_ids_allow_short_names() {
        assert!(validate_unit_id("p").is_ok());
        assert_matches!(validate_unit_id(""), Err(CoreError::Validation(_)));
        assert_matches!(validate_unit_id("pod:1"), Err(CoreError::Validation(_)));
    }
}
