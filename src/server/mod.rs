//! HTTP surface for the resource hub.
//!
//! Lets an orchestrating agent discover and invoke integration actions
//! over HTTP.
//!
//! # Endpoints
//!
//! - `GET  /health`: Liveness probe
//! - `GET  /actions`: Listings for every resource type
//! - `GET  /actions/:resource`: Listings for one resource type
//! - `POST /actions/:resource/:action`: Invoke an action

pub mod routes;

pub use routes::{app_router, AppState};
