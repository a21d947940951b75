//! # Resource Hub
//!
//! Routes a `(resource_type, action, params)` request to the integration
//! client registered for that resource type, and aggregates the action
//! listings of every registered client.
//!
//! ```text
//! fetch_resource("errors", "get_issue", {issue_id})
//!   → SentryClient::execute_action("get_issue", {issue_id})
//!   → ActionResult
//! ```

pub mod resource_hub;

pub use resource_hub::{HubError, ResourceActions, ResourceHub};

/// Source control (GitHub).
pub const CODE: &str = "code";
/// Error tracking (Sentry).
pub const ERRORS: &str = "errors";
/// Chat (Slack).
pub const SLACK: &str = "slack";
