//! Action Registry: per-client table of named actions.
//!
//! Built once when a client is constructed and never mutated afterwards.
//! Lookup is by action name; listing follows registration order.

use std::collections::HashMap;
use std::collections::HashSet;

use serde_json::Value;

use super::action::{Action, Params};
use super::descriptor::{ActionDescriptor, ActionListing};
use super::error::{InvocationError, RegistryError};
use super::gateway::ActionResult;

/// What the builder does when two actions share a name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Fail the build with [`RegistryError::DuplicateAction`].
    #[default]
    Reject,
    /// The later action replaces the earlier one, keeping its position.
    LastWins,
}

/// Immutable name → action table.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    /// Actions in registration order
    actions: Vec<Action>,

    /// Action name → position in `actions`
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up an action by name.
    pub fn get(&self, name: &str) -> Option<&Action> {
        self.index.get(name).map(|&i| &self.actions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Action names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(Action::name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.actions.iter().map(Action::descriptor)
    }

    /// One listing per registered action, in registration order.
    pub fn available_actions(&self) -> Vec<ActionListing> {
        self.descriptors().map(ActionDescriptor::listing).collect()
    }

    /// Validate, bind and invoke. Failures stay typed.
    pub async fn try_execute(&self, name: &str, params: Params) -> Result<Value, InvocationError> {
        let action = self
            .get(name)
            .ok_or_else(|| InvocationError::UnknownAction(name.to_string()))?;
        let args = action.bind(params)?;
        log::debug!("Executing action {} with {} bound parameters", name, args.len());
        action.call(args).await
    }

    /// Execute an action by name and fold every outcome into the envelope.
    pub async fn execute_action(&self, name: &str, params: Params) -> ActionResult {
        let result = self.try_execute(name, params).await;
        if let Err(err) = &result {
            log::warn!("Action {} failed: {}", name, err);
        }
        ActionResult::from(result)
    }
}

/// Collects actions and produces an [`ActionRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    actions: Vec<Action>,
    policy: CollisionPolicy,
}

impl RegistryBuilder {
    pub fn on_collision(mut self, policy: CollisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions.extend(actions);
        self
    }

    pub fn build(self) -> Result<ActionRegistry, RegistryError> {
        let mut registry = ActionRegistry::default();

        for action in self.actions {
            validate(action.descriptor())?;
            let name = action.name().to_string();
            match registry.index.get(&name) {
                Some(&slot) => match self.policy {
                    CollisionPolicy::Reject => return Err(RegistryError::DuplicateAction(name)),
                    CollisionPolicy::LastWins => {
                        log::warn!("Action {} registered twice; keeping the later one", name);
                        registry.actions[slot] = action;
                    }
                },
                None => {
                    registry.index.insert(name, registry.actions.len());
                    registry.actions.push(action);
                }
            }
        }

        Ok(registry)
    }
}

fn validate(descriptor: &ActionDescriptor) -> Result<(), RegistryError> {
    if descriptor.name.trim().is_empty() {
        return Err(RegistryError::EmptyName);
    }
    let mut seen = HashSet::new();
    for name in descriptor.param_names() {
        if !seen.insert(name) {
            return Err(RegistryError::DuplicateParameter {
                action: descriptor.name.clone(),
                param: name.to_string(),
            });
        }
    }
    Ok(())
}
