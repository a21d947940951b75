//! Bound arguments handed to an action handler.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while reading a bound argument inside a handler.
#[derive(Debug, Error)]
pub enum ArgError {
    /// The parameter is unbound or bound to null.
    #[error("Parameter '{name}' of {action} has no value")]
    Missing { action: String, name: String },

    /// The bound value does not have the expected shape.
    #[error("Invalid value for parameter '{name}' of {action}: {source}")]
    Invalid {
        action: String,
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The argument set for one invocation.
///
/// Contains exactly the formal parameters of the action that were bound,
/// in declaration order. Omitted optional parameters are bound to
/// `Value::Null`; undeclared request keys never reach this struct.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionArgs {
    action: String,
    values: Vec<(String, Value)>,
}

impl ActionArgs {
    pub fn new(action: impl Into<String>, values: Vec<(String, Value)>) -> Self {
        Self {
            action: action.into(),
            values,
        }
    }

    /// Name of the action these arguments were bound for.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Raw bound value, `None` when the parameter is not bound at all.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Whether the parameter is bound to null or not bound.
    pub fn is_null(&self, name: &str) -> bool {
        self.get(name).map_or(true, Value::is_null)
    }

    /// Read a parameter that must carry a non-null value.
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArgError> {
        match self.get(name) {
            Some(value) if !value.is_null() => self.decode(name, value),
            _ => Err(ArgError::Missing {
                action: self.action.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Read a parameter that may be null; null and unbound both yield `None`.
    pub fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ArgError> {
        match self.get(name) {
            Some(value) if !value.is_null() => self.decode(name, value).map(Some),
            _ => Ok(None),
        }
    }

    /// Bound parameter names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume into a JSON object (useful for recording what a handler saw).
    pub fn into_value(self) -> Value {
        Value::Object(self.values.into_iter().collect())
    }

    fn decode<T: DeserializeOwned>(&self, name: &str, value: &Value) -> Result<T, ArgError> {
        T::deserialize(value).map_err(|source| ArgError::Invalid {
            action: self.action.clone(),
            name: name.to_string(),
            source,
        })
    }
}
