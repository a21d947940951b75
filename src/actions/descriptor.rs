//! Action descriptors: the introspectable half of an action.
//!
//! A descriptor carries the action's name, its prose description (written for
//! a human or LLM caller) and its ordered formal parameter list. Each
//! parameter is classified once, when the action is declared, as required or
//! optional. The classification is what callers read to decide which keys
//! they must supply.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// How a formal parameter participates in binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Must be present in the request; the action is rejected otherwise.
    Required,
    /// Declared with an optional ("nullable") type. Optional even when the
    /// handler has no fallback for it.
    Nullable,
    /// Carries a default inside the handler. Optional.
    Defaulted,
}

impl ParamKind {
    /// Classify a parameter from the shape of its declaration.
    ///
    /// A parameter is required only when it is neither optional-typed nor
    /// defaulted. An optional-typed parameter stays `Nullable` whether or not
    /// it also has a default, so a nullable parameter that the handler really
    /// needs is still reported as optional.
    pub fn classify(optional_typed: bool, has_default: bool) -> Self {
        match (optional_typed, has_default) {
            (true, _) => ParamKind::Nullable,
            (false, true) => ParamKind::Defaulted,
            (false, false) => ParamKind::Required,
        }
    }

    /// Whether the gateway may fill this parameter with a null placeholder.
    pub fn is_optional(self) -> bool {
        !matches!(self, ParamKind::Required)
    }
}

/// A single formal parameter of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Build a spec from declaration shape, see [`ParamKind::classify`].
    pub fn from_signature(name: impl Into<String>, optional_typed: bool, has_default: bool) -> Self {
        Self::new(name, ParamKind::classify(optional_typed, has_default))
    }

    pub fn is_optional(&self) -> bool {
        self.kind.is_optional()
    }
}

/// Metadata describing one action. Immutable once the action is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Unique name within one registry.
    pub name: String,
    /// Free text for the caller deciding what to invoke.
    pub description: String,
    /// Formal parameters in declaration order.
    pub params: Vec<ParamSpec>,
}

impl ActionDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// All formal parameter names, in declaration order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|p| p.name.as_str())
    }

    pub fn required_params(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| !p.is_optional())
            .map(|p| p.name.as_str())
    }

    pub fn optional_params(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| p.is_optional())
            .map(|p| p.name.as_str())
    }

    /// Whether `name` is one of the formal parameters.
    pub fn declares(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    /// The introspection record for this action.
    pub fn listing(&self) -> ActionListing {
        ActionListing {
            name: self.name.clone(),
            info: ActionInfo {
                description: self.description.clone(),
                params: self
                    .params
                    .iter()
                    .map(|p| ParamEntry {
                        name: p.name.clone(),
                        optional: p.is_optional(),
                    })
                    .collect(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Listing records
// ---------------------------------------------------------------------------

/// One parameter as shown to callers. `optional` is only emitted when true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Description and parameters of a listed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInfo {
    pub description: String,
    /// Omitted entirely when the action takes no parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamEntry>,
}

/// Introspection entry for one action.
///
/// Serializes as a single-key map: `{"<name>": {"description": .., "params": [..]}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionListing {
    pub name: String,
    pub info: ActionInfo,
}

impl Serialize for ActionListing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.info)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ActionDescriptor {
        let mut d = ActionDescriptor::new("get_issues", "Get issues");
        d.params = vec![
            ParamSpec::new("project_slug", ParamKind::Nullable),
            ParamSpec::new("org", ParamKind::Required),
            ParamSpec::new("limit", ParamKind::Defaulted),
        ];
        d
    }

    #[test]
    fn test_classify_rule() {
        assert_eq!(ParamKind::classify(false, false), ParamKind::Required);
        assert_eq!(ParamKind::classify(false, true), ParamKind::Defaulted);
        assert_eq!(ParamKind::classify(true, true), ParamKind::Nullable);
        // Optional-typed without a default is still optional, even if the
        // handler cannot do anything useful without it.
        assert_eq!(ParamKind::classify(true, false), ParamKind::Nullable);
        assert!(ParamKind::classify(true, false).is_optional());
        assert!(!ParamKind::classify(false, false).is_optional());
    }

    #[test]
    fn test_required_and_optional_partition_params() {
        let d = sample();
        let required: Vec<&str> = d.required_params().collect();
        let optional: Vec<&str> = d.optional_params().collect();
        assert_eq!(required, vec!["org"]);
        assert_eq!(optional, vec!["project_slug", "limit"]);

        let mut all: Vec<&str> = required.iter().chain(optional.iter()).copied().collect();
        all.sort();
        let mut declared: Vec<&str> = d.param_names().collect();
        declared.sort();
        assert_eq!(all, declared);
    }

    #[test]
    fn test_listing_shape() {
        let listing = serde_json::to_value(sample().listing()).unwrap();
        assert_eq!(
            listing,
            json!({
                "get_issues": {
                    "description": "Get issues",
                    "params": [
                        {"name": "project_slug", "optional": true},
                        {"name": "org"},
                        {"name": "limit", "optional": true}
                    ]
                }
            })
        );
    }

    #[test]
    fn test_listing_omits_params_when_none() {
        let d = ActionDescriptor::new("get_projects", "Get all projects");
        let listing = serde_json::to_value(d.listing()).unwrap();
        assert_eq!(listing, json!({"get_projects": {"description": "Get all projects"}}));
    }

    #[test]
    fn test_declares() {
        let d = sample();
        assert!(d.declares("limit"));
        assert!(!d.declares("cursor"));
    }
}
