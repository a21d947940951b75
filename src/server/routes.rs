//! Axum route handlers for the integrations server.
//!
//! # Routes
//!
//! - `GET  /health`: Returns `{"status": "ok", "version": ..}`
//! - `GET  /actions`: `[{"<resource>": [<listing>, ..]}, ..]`
//! - `GET  /actions/:resource`: `[<listing>, ..]`
//! - `POST /actions/:resource/:action`: JSON object body is the parameter map
//!
//! Invocation responses are always the `ActionResult` envelope. Routing and
//! body failures use the error variant with a non-200 status.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::actions::{ActionListing, ActionResult, Params};
use crate::hub::{HubError, ResourceActions, ResourceHub};

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ResourceHub>,
    /// Caller-side limit on one invocation. `None` waits for the handler.
    pub action_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(hub: ResourceHub) -> Self {
        Self {
            hub: Arc::new(hub),
            action_timeout: None,
        }
    }

    pub fn with_action_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.action_timeout = timeout;
        self
    }
}

type ErrorResponse = (StatusCode, Json<ActionResult>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ErrorResponse {
    (status, Json(ActionResult::error(message)))
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/actions", get(list_actions_handler))
        .route("/actions/:resource", get(resource_actions_handler))
        .route("/actions/:resource/:action", post(execute_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health, liveness probe.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "resources": state.hub.resource_types().collect::<Vec<_>>(),
    }))
}

/// GET /actions
async fn list_actions_handler(State(state): State<AppState>) -> Json<Vec<ResourceActions>> {
    Json(state.hub.get_actions())
}

/// GET /actions/:resource
async fn resource_actions_handler(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<Json<Vec<ActionListing>>, ErrorResponse> {
    state.hub.actions_for(&resource).map(Json).ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            HubError::UnsupportedResource(resource).to_string(),
        )
    })
}

/// POST /actions/:resource/:action
///
/// An empty body is an empty parameter map. Anything other than a JSON
/// object is rejected before routing.
async fn execute_handler(
    State(state): State<AppState>,
    Path((resource, action)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<ActionResult>, ErrorResponse> {
    let params = parse_params(&body)?;

    let invocation = state.hub.fetch_resource(&resource, &action, params);
    let outcome = match state.action_timeout {
        Some(limit) => match tokio::time::timeout(limit, invocation).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let message = format!(
                    "Action {} timed out after {}s",
                    action,
                    limit.as_secs_f64()
                );
                tracing::warn!(%resource, "{}", message);
                return Ok(Json(ActionResult::error(message)));
            }
        },
        None => invocation.await,
    };

    match outcome {
        Ok(result) => Ok(Json(result)),
        Err(err @ HubError::UnsupportedResource(_)) => {
            Err(error_response(StatusCode::NOT_FOUND, err.to_string()))
        }
        Err(err) => Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())),
    }
}

fn parse_params(body: &[u8]) -> Result<Params, ErrorResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Params::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(params)) => Ok(params),
        Ok(other) => Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Request body must be a JSON object, got {}", json_kind(&other)),
        )),
        Err(e) => Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("Invalid JSON body: {}", e),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
