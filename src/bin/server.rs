//! oncall-integrations HTTP server binary.
//!
//! Serves the resource hub so an orchestrating agent can list and invoke
//! integration actions.
//!
//! # Environment Variables
//!
//! - `ONCALL_INTEGRATIONS_CONFIG`: Path to a YAML config file (optional)
//! - `SLACK_BOT_TOKEN`: Enables the `slack` resource
//! - `SENTRY_AUTH_TOKEN` / `SENTRY_ORG`: Enable the `errors` resource
//! - `GITHUB_TOKEN`: Enables the `code` resource
//! - `PORT`: HTTP port (default: 8080)
//! - `ACTION_TIMEOUT_SECS`: Caller-side limit on one invocation (optional)
//! - `RUST_LOG`: Tracing filter (default: "info,oncall_integrations=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! ```

use std::time::Duration;

use oncall_integrations::hub::ResourceHub;
use oncall_integrations::server::{app_router, AppState};
use oncall_integrations::utilities::config::IntegrationsConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,oncall_integrations=debug".into()),
        )
        .init();

    let config = IntegrationsConfig::load()?;
    let hub = ResourceHub::from_config(&config)?;

    let state = AppState::new(hub)
        .with_action_timeout(config.server.action_timeout_secs.map(Duration::from_secs));
    let app = app_router(state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("oncall-integrations server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                    liveness probe");
    tracing::info!("  GET  /actions                   list actions per resource");
    tracing::info!("  POST /actions/:resource/:action invoke an action");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
