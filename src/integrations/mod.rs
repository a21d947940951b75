//! # Integrations
//!
//! Thin clients for the third-party services the calling agent talks to.
//! Each client owns an [`ActionRegistry`](crate::actions::ActionRegistry)
//! built in its constructor and implements
//! [`ActionRouter`](crate::actions::ActionRouter), so it can be listed and
//! invoked by name like any other.
//!
//! Clients keep their HTTP state in an `Arc`'d inner struct that the action
//! handlers capture; the registry itself never changes after construction.

pub mod github;
pub mod http;
pub mod sentry;
pub mod slack;

use thiserror::Error;

use crate::actions::RegistryError;

pub use github::GitHubClient;
pub use http::{ApiClient, ApiError};
pub use sentry::SentryClient;
pub use slack::SlackClient;

/// Errors raised while constructing an integration client.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("API client error: {0}")]
    Api(#[from] ApiError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}
