//! Invocation gateway: the result envelope and the router trait.
//!
//! Every integration client implements [`ActionRouter`] by handing out its
//! [`ActionRegistry`]. Callers only ever see two operations: list the
//! actions, or execute one and read the envelope.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::Params;
use super::descriptor::ActionListing;
use super::error::InvocationError;
use super::registry::ActionRegistry;

/// Outcome of one invocation. There is no partial-success variant.
///
/// Serializes as `{"status": "success", "data": ..}` or
/// `{"status": "error", "message": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResult {
    Success { data: Value },
    Error { message: String },
}

impl ActionResult {
    pub fn success(data: Value) -> Self {
        ActionResult::Success { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ActionResult::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ActionResult::Success { data } => Some(data),
            ActionResult::Error { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ActionResult::Success { .. } => None,
            ActionResult::Error { message } => Some(message),
        }
    }

    pub fn into_result(self) -> Result<Value, String> {
        match self {
            ActionResult::Success { data } => Ok(data),
            ActionResult::Error { message } => Err(message),
        }
    }
}

impl From<Result<Value, InvocationError>> for ActionResult {
    fn from(result: Result<Value, InvocationError>) -> Self {
        match result {
            Ok(data) => ActionResult::success(data),
            Err(err) => ActionResult::error(err.to_string()),
        }
    }
}

/// A client that exposes named actions.
///
/// Implementors only provide `registry()`; listing and execution come from
/// the registry and behave identically for every integration.
#[async_trait]
pub trait ActionRouter: Send + Sync {
    /// The registry built when the client was constructed.
    fn registry(&self) -> &ActionRegistry;

    /// Describe every registered action, in registration order.
    fn available_actions(&self) -> Vec<ActionListing> {
        self.registry().available_actions()
    }

    /// Execute an action by name. Never fails; see [`ActionResult`].
    async fn execute_action(&self, action: &str, params: Params) -> ActionResult {
        self.registry().execute_action(action, params).await
    }
}
