//! Gateway-level error taxonomy.
//!
//! None of these escape `execute_action`; they are rendered into the error
//! envelope. `try_execute` exposes them typed for callers that want to match.

use thiserror::Error;

/// Why an invocation did not produce data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationError {
    /// The requested action name is not registered.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Required parameters absent after optional parameters were filled.
    #[error("Missing required parameters for {action}: {}", .missing.join(", "))]
    MissingRequiredParameters { action: String, missing: Vec<String> },

    /// The handler failed or panicked. Holds its display string only.
    #[error("{0}")]
    ExecutionFailed(String),
}

/// Errors raised while building a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Duplicate action name: {0}")]
    DuplicateAction(String),

    #[error("Duplicate parameter '{param}' in action {action}")]
    DuplicateParameter { action: String, param: String },

    #[error("Action name must not be empty")]
    EmptyName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            InvocationError::UnknownAction("subtract".into()).to_string(),
            "Unknown action: subtract"
        );
        assert_eq!(
            InvocationError::MissingRequiredParameters {
                action: "get_event".into(),
                missing: vec!["project_slug".into(), "event_id".into()],
            }
            .to_string(),
            "Missing required parameters for get_event: project_slug, event_id"
        );
        assert_eq!(
            InvocationError::ExecutionFailed("boom".into()).to_string(),
            "boom"
        );
    }
}
