//! An action: a descriptor bound to the handler that implements it.
//!
//! Actions are declared explicitly with [`Action::builder`]; the formal
//! parameter list and its required/optional split are written down at
//! declaration time rather than inferred from the handler.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};

use super::args::ActionArgs;
use super::descriptor::{ActionDescriptor, ParamKind, ParamSpec};
use super::error::InvocationError;

/// Request parameters: parameter name to JSON value.
pub type Params = Map<String, Value>;

/// Type-erased async handler.
pub type ActionHandler =
    Arc<dyn Fn(ActionArgs) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// A named, described, invocable operation.
#[derive(Clone)]
pub struct Action {
    descriptor: ActionDescriptor,
    handler: ActionHandler,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.descriptor.name)
            .field("description", &self.descriptor.description)
            .field("params", &self.descriptor.params)
            .finish()
    }
}

impl Action {
    /// Start declaring an action. The description is mandatory.
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> ActionBuilder {
        ActionBuilder {
            descriptor: ActionDescriptor::new(name, description),
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ActionDescriptor {
        &self.descriptor
    }

    /// Bind request parameters to the formal parameter list.
    ///
    /// Omitted optional parameters are bound to null, missing required ones
    /// are reported all at once in declaration order, and keys the action
    /// does not declare are dropped.
    pub fn bind(&self, mut params: Params) -> Result<ActionArgs, InvocationError> {
        for name in self.descriptor.optional_params() {
            params.entry(name.to_string()).or_insert(Value::Null);
        }

        let missing: Vec<String> = self
            .descriptor
            .required_params()
            .filter(|name| !params.contains_key(*name))
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(InvocationError::MissingRequiredParameters {
                action: self.descriptor.name.clone(),
                missing,
            });
        }

        let values: Vec<(String, Value)> = self
            .descriptor
            .params
            .iter()
            .filter_map(|p| params.remove(&p.name).map(|v| (p.name.clone(), v)))
            .collect();

        if !params.is_empty() {
            log::debug!(
                "Dropping undeclared parameters for {}: {:?}",
                self.descriptor.name,
                params.keys().collect::<Vec<_>>()
            );
        }

        Ok(ActionArgs::new(self.descriptor.name.clone(), values))
    }

    /// Run the handler. Errors and panics both come back as
    /// [`InvocationError::ExecutionFailed`].
    pub async fn call(&self, args: ActionArgs) -> Result<Value, InvocationError> {
        let handler = Arc::clone(&self.handler);
        let pending = match std::panic::catch_unwind(AssertUnwindSafe(move || handler(args))) {
            Ok(pending) => pending,
            Err(payload) => {
                return Err(InvocationError::ExecutionFailed(panic_message(payload.as_ref())))
            }
        };

        match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(InvocationError::ExecutionFailed(err.to_string())),
            Err(payload) => Err(InvocationError::ExecutionFailed(panic_message(
                payload.as_ref(),
            ))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "action panicked".to_string()
    }
}

/// Fluent declaration of an action's parameters and handler.
#[derive(Debug, Clone)]
pub struct ActionBuilder {
    descriptor: ActionDescriptor,
}

impl ActionBuilder {
    /// Declare a required parameter.
    pub fn param(self, name: impl Into<String>) -> Self {
        self.with_param(ParamSpec::new(name, ParamKind::Required))
    }

    /// Declare an optional-typed parameter (bound to null when omitted).
    pub fn nullable(self, name: impl Into<String>) -> Self {
        self.with_param(ParamSpec::new(name, ParamKind::Nullable))
    }

    /// Declare a parameter whose default lives in the handler. The handler
    /// sees null when the caller omits it.
    pub fn defaulted(self, name: impl Into<String>) -> Self {
        self.with_param(ParamSpec::new(name, ParamKind::Defaulted))
    }

    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        self.descriptor.params.push(spec);
        self
    }

    /// Finish with an async handler.
    pub fn handler<F, Fut, R>(self, f: F) -> Action
    where
        F: Fn(ActionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let handler: ActionHandler = Arc::new(move |args| {
            let pending = f(args);
            async move {
                let output = pending.await?;
                serde_json::to_value(output).map_err(anyhow::Error::from)
            }
            .boxed()
        });
        Action {
            descriptor: self.descriptor,
            handler,
        }
    }

    /// Finish with a synchronous handler.
    pub fn handler_sync<F, R>(self, f: F) -> Action
    where
        F: Fn(ActionArgs) -> anyhow::Result<R> + Send + Sync + 'static,
        R: Serialize,
    {
        let handler: ActionHandler = Arc::new(move |args| {
            let result = f(args)
                .and_then(|output| serde_json::to_value(output).map_err(anyhow::Error::from));
            future::ready(result).boxed()
        });
        Action {
            descriptor: self.descriptor,
            handler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("params must be an object"),
        }
    }

    fn echo() -> Action {
        Action::builder("echo", "Echo the bound arguments")
            .param("a")
            .nullable("b")
            .defaulted("c")
            .handler_sync(|args| Ok(args.into_value()))
    }

    #[test]
    fn test_bind_fills_optionals_with_null() {
        let args = echo().bind(params(json!({"a": 1}))).unwrap();
        assert_eq!(args.into_value(), json!({"a": 1, "b": null, "c": null}));
    }

    #[test]
    fn test_bind_keeps_supplied_optionals() {
        let args = echo().bind(params(json!({"a": 1, "c": 5}))).unwrap();
        assert_eq!(args.into_value(), json!({"a": 1, "b": null, "c": 5}));
    }

    #[test]
    fn test_bind_reports_all_missing_required() {
        let action = Action::builder("get_event", "Get a particular event")
            .param("project_slug")
            .param("event_id")
            .handler_sync(|_| Ok(Value::Null));
        let err = action.bind(Params::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required parameters for get_event: project_slug, event_id"
        );
    }

    #[test]
    fn test_bind_drops_undeclared_keys() {
        let args = echo()
            .bind(params(json!({"a": 1, "z": "extra"})))
            .unwrap();
        let names: Vec<&str> = args.names().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_explicit_null_counts_as_present() {
        // A required key supplied as null passes binding; the handler decides.
        let args = echo().bind(params(json!({"a": null}))).unwrap();
        assert!(args.is_null("a"));
    }

    #[tokio::test]
    async fn test_call_converts_errors() {
        let action = Action::builder("fail", "Always fails")
            .handler(|_| async { Err::<Value, _>(anyhow::anyhow!("upstream returned 502")) });
        let err = action.call(ActionArgs::new("fail", vec![])).await.unwrap_err();
        assert_eq!(
            err,
            InvocationError::ExecutionFailed("upstream returned 502".to_string())
        );
    }

    #[tokio::test]
    async fn test_call_catches_panics() {
        let action = Action::builder("explode", "Panics")
            .handler_sync(|_| -> anyhow::Result<Value> { panic!("index out of range") });
        let err = action
            .call(ActionArgs::new("explode", vec![]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            InvocationError::ExecutionFailed("index out of range".to_string())
        );
    }

    #[tokio::test]
    async fn test_call_serializes_return_value() {
        #[derive(Serialize)]
        struct Repo {
            name: String,
            private: bool,
        }
        let action = Action::builder("repo", "Return a repo").handler(|_| async {
            Ok(Repo {
                name: "api".into(),
                private: true,
            })
        });
        let value = action.call(ActionArgs::new("repo", vec![])).await.unwrap();
        assert_eq!(value, json!({"name": "api", "private": true}));
    }
}
