//! ResourceHub: resource type → integration client.

use std::fmt;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::actions::{ActionListing, ActionResult, ActionRouter, Params};
use crate::integrations::{GitHubClient, IntegrationError, SentryClient, SlackClient};
use crate::utilities::config::IntegrationsConfig;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Unsupported resource type {0}")]
    UnsupportedResource(String),

    #[error("Resource type already registered: {0}")]
    DuplicateResource(String),

    #[error("Failed to build integration for {resource}: {source}")]
    Integration {
        resource: String,
        #[source]
        source: IntegrationError,
    },
}

/// Listings of one resource type. Serializes as `{"<resource>": [..]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceActions {
    pub resource_type: String,
    pub actions: Vec<ActionListing>,
}

impl Serialize for ResourceActions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.resource_type, &self.actions)?;
        map.end()
    }
}

/// Ordered table of routers keyed by resource type.
#[derive(Clone, Default)]
pub struct ResourceHub {
    routers: Vec<(String, Arc<dyn ActionRouter>)>,
}

impl fmt::Debug for ResourceHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHub")
            .field("resource_types", &self.resource_types().collect::<Vec<_>>())
            .finish()
    }
}

impl ResourceHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a hub with a client for every integration present in `config`.
    pub fn from_config(config: &IntegrationsConfig) -> Result<Self, HubError> {
        fn built<T: ActionRouter + 'static>(
            resource: &str,
            client: Result<T, IntegrationError>,
        ) -> Result<Arc<dyn ActionRouter>, HubError> {
            client
                .map(|c| Arc::new(c) as Arc<dyn ActionRouter>)
                .map_err(|source| HubError::Integration {
                    resource: resource.to_string(),
                    source,
                })
        }

        let mut hub = Self::new();
        if let Some(github) = &config.github {
            hub.register(super::CODE, built(super::CODE, GitHubClient::new(github))?)?;
        }
        if let Some(sentry) = &config.sentry {
            hub.register(super::ERRORS, built(super::ERRORS, SentryClient::new(sentry))?)?;
        }
        if let Some(slack) = &config.slack {
            hub.register(super::SLACK, built(super::SLACK, SlackClient::new(slack))?)?;
        }

        if hub.is_empty() {
            log::warn!("No integrations configured");
        } else {
            log::info!(
                "Configured integrations: {}",
                hub.resource_types().collect::<Vec<_>>().join(", ")
            );
        }
        Ok(hub)
    }

    pub fn register(
        &mut self,
        resource_type: impl Into<String>,
        router: Arc<dyn ActionRouter>,
    ) -> Result<(), HubError> {
        let resource_type = resource_type.into();
        if self.router(&resource_type).is_some() {
            return Err(HubError::DuplicateResource(resource_type));
        }
        self.routers.push((resource_type, router));
        Ok(())
    }

    pub fn router(&self, resource_type: &str) -> Option<&Arc<dyn ActionRouter>> {
        self.routers
            .iter()
            .find(|(name, _)| name == resource_type)
            .map(|(_, router)| router)
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.routers.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    /// Execute `action` on the client registered for `resource_type`.
    ///
    /// Only an unknown resource type is an `Err`; everything past routing is
    /// reported inside the envelope.
    pub async fn fetch_resource(
        &self,
        resource_type: &str,
        action: &str,
        params: Params,
    ) -> Result<ActionResult, HubError> {
        let router = self.router(resource_type).ok_or_else(|| {
            log::warn!("Requested unsupported resource type {}", resource_type);
            HubError::UnsupportedResource(resource_type.to_string())
        })?;
        log::debug!("Routing {}::{}", resource_type, action);
        Ok(router.execute_action(action, params).await)
    }

    /// Listings for one resource type.
    pub fn actions_for(&self, resource_type: &str) -> Option<Vec<ActionListing>> {
        self.router(resource_type).map(|r| r.available_actions())
    }

    /// Listings for every registered resource type, in registration order.
    pub fn get_actions(&self) -> Vec<ResourceActions> {
        self.routers
            .iter()
            .map(|(name, router)| ResourceActions {
                resource_type: name.clone(),
                actions: router.available_actions(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, ActionRegistry};
    use crate::utilities::config::{GitHubConfig, SentryConfig};
    use serde_json::json;

    struct Flags {
        actions: ActionRegistry,
    }

    impl Flags {
        fn new() -> Self {
            let actions = ActionRegistry::builder()
                .action(
                    Action::builder("get_flag", "Get a feature flag")
                        .param("key")
                        .handler_sync(|args| {
                            let key: String = args.require("key")?;
                            Ok(json!({"key": key, "on": true}))
                        }),
                )
                .build()
                .unwrap();
            Self { actions }
        }
    }

    impl ActionRouter for Flags {
        fn registry(&self) -> &ActionRegistry {
            &self.actions
        }
    }

    fn hub() -> ResourceHub {
        let mut hub = ResourceHub::new();
        hub.register("featureflag", Arc::new(Flags::new())).unwrap();
        hub
    }

    #[tokio::test]
    async fn test_fetch_routes_to_client() {
        let mut params = Params::new();
        params.insert("key".into(), json!("new-checkout"));
        let result = hub()
            .fetch_resource("featureflag", "get_flag", params)
            .await
            .unwrap();
        assert_eq!(result.data(), Some(&json!({"key": "new-checkout", "on": true})));
    }

    #[tokio::test]
    async fn test_unknown_action_stays_in_envelope() {
        let result = hub()
            .fetch_resource("featureflag", "delete_flag", Params::new())
            .await
            .unwrap();
        assert_eq!(result, ActionResult::error("Unknown action: delete_flag"));
    }

    #[tokio::test]
    async fn test_unsupported_resource() {
        let err = hub()
            .fetch_resource("logs", "search", Params::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HubError::UnsupportedResource(ref r) if r == "logs"));
        assert_eq!(err.to_string(), "Unsupported resource type logs");
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let mut hub = hub();
        let err = hub
            .register("featureflag", Arc::new(Flags::new()))
            .unwrap_err();
        assert!(matches!(err, HubError::DuplicateResource(_)));
    }

    #[test]
    fn test_get_actions_shape() {
        let listing = serde_json::to_value(hub().get_actions()).unwrap();
        assert_eq!(
            listing,
            json!([{
                "featureflag": [{
                    "get_flag": {
                        "description": "Get a feature flag",
                        "params": [{"name": "key"}]
                    }
                }]
            }])
        );
    }

    #[test]
    fn test_from_config_registers_configured_only() {
        let config = IntegrationsConfig {
            github: Some(GitHubConfig::new("ghp_test")),
            sentry: Some(SentryConfig::new("token", "acme")),
            ..Default::default()
        };
        let hub = ResourceHub::from_config(&config).unwrap();
        assert_eq!(
            hub.resource_types().collect::<Vec<_>>(),
            vec![crate::hub::CODE, crate::hub::ERRORS]
        );
        assert!(hub.actions_for(crate::hub::SLACK).is_none());
        assert!(!hub.actions_for(crate::hub::ERRORS).unwrap().is_empty());
    }

    #[test]
    fn test_empty_config_builds_empty_hub() {
        let hub = ResourceHub::from_config(&IntegrationsConfig::default()).unwrap();
        assert!(hub.is_empty());
        assert!(hub.get_actions().is_empty());
    }
}
