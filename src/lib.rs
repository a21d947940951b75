//! # oncall-integrations
//!
//! Exposes on-call integrations (source control, error tracking, chat) to an
//! orchestrating agent as named actions.
//!
//! Each integration client registers its actions with an
//! [`ActionRegistry`](actions::ActionRegistry) when it is built. An agent can
//! then discover actions through `available_actions()` and invoke them by
//! name through `execute_action()`, which always answers with an
//! [`ActionResult`](actions::ActionResult) envelope instead of an error.
//!
//! ```text
//! ResourceHub ── "code"   → GitHubClient ─┐
//!             ── "errors" → SentryClient ─┼─ ActionRegistry → handler
//!             ── "slack"  → SlackClient  ─┘
//! ```

pub mod actions;
pub mod hub;
pub mod integrations;
pub mod server;
pub mod utilities;

pub use actions::{
    Action, ActionArgs, ActionDescriptor, ActionListing, ActionRegistry, ActionResult,
    ActionRouter, CollisionPolicy, InvocationError, ParamKind, Params, RegistryError,
};
pub use hub::{HubError, ResourceHub};
pub use integrations::{GitHubClient, SentryClient, SlackClient};
pub use utilities::config::IntegrationsConfig;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
