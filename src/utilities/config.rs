//! Configuration loading.
//!
//! Configuration comes from a YAML file (path in `ONCALL_INTEGRATIONS_CONFIG`)
//! or, when no file is named, from individual environment variables. String
//! values in the YAML may reference the environment as `${VAR}`.
//!
//! ```yaml
//! server:
//!   port: 8080
//!   action_timeout_secs: 60
//! slack:
//!   bot_token: "${SLACK_BOT_TOKEN}"
//! sentry:
//!   auth_token: "${SENTRY_AUTH_TOKEN}"
//!   organization_slug: "acme"
//! github:
//!   access_token: "${GITHUB_TOKEN}"
//! ```

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the YAML configuration file.
pub const CONFIG_PATH_ENV: &str = "ONCALL_INTEGRATIONS_CONFIG";

static ENV_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Top-level configuration for the integrations and the HTTP surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub slack: Option<SlackConfig>,
    #[serde(default)]
    pub sentry: Option<SentryConfig>,
    #[serde(default)]
    pub github: Option<GitHubConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Caller-side limit on one invocation. `None` waits indefinitely.
    #[serde(default)]
    pub action_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            action_timeout_secs: None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub bot_token: String,
    #[serde(default = "default_slack_api_url")]
    pub api_url: String,
}

fn default_slack_api_url() -> String {
    "https://slack.com/api/".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SentryConfig {
    pub auth_token: String,
    pub organization_slug: String,
    #[serde(default = "default_sentry_api_url")]
    pub api_url: String,
}

fn default_sentry_api_url() -> String {
    "https://sentry.io/api/0/".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub access_token: String,
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

impl SlackConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_url: default_slack_api_url(),
        }
    }
}

impl SentryConfig {
    pub fn new(auth_token: impl Into<String>, organization_slug: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            organization_slug: organization_slug.into(),
            api_url: default_sentry_api_url(),
        }
    }
}

impl GitHubConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            api_url: default_github_api_url(),
        }
    }
}

// Tokens stay out of Debug output (and therefore out of logs).
fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl fmt::Debug for SentryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentryConfig")
            .field("auth_token", &redact(&self.auth_token))
            .field("organization_slug", &self.organization_slug)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("access_token", &redact(&self.access_token))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl IntegrationsConfig {
    /// Load from the file named by `ONCALL_INTEGRATIONS_CONFIG`, falling back
    /// to plain environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                log::info!("Loading integrations config from {}", path);
                Self::from_file(path)
            }
            _ => Self::from_env(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML after expanding `${VAR}` references.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(content);
        Ok(serde_yaml::from_str(&expanded)?)
    }

    /// Build from environment variables. An integration is configured only
    /// when all of its credentials are present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(port) = non_empty_env("PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(timeout) = non_empty_env("ACTION_TIMEOUT_SECS") {
            config.server.action_timeout_secs =
                Some(timeout.parse().map_err(|_| ConfigError::InvalidValue {
                    name: "ACTION_TIMEOUT_SECS".to_string(),
                    value: timeout.clone(),
                })?);
        }

        config.slack = non_empty_env("SLACK_BOT_TOKEN").map(SlackConfig::new);

        config.sentry = match (
            non_empty_env("SENTRY_AUTH_TOKEN"),
            non_empty_env("SENTRY_ORG"),
        ) {
            (Some(token), Some(org)) => Some(SentryConfig::new(token, org)),
            _ => None,
        };

        config.github = non_empty_env("GITHUB_TOKEN").map(GitHubConfig::new);

        Ok(config)
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Replace `${VAR}` with the variable's value (empty when unset).
pub fn expand_env_vars(input: &str) -> String {
    ENV_REFERENCE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_applied() {
        let config = IntegrationsConfig::from_yaml("github:\n  access_token: abc\n").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.action_timeout_secs, None);
        assert!(config.slack.is_none());
        let github = config.github.unwrap();
        assert_eq!(github.access_token, "abc");
        assert_eq!(github.api_url, "https://api.github.com");
    }

    #[test]
    fn test_env_expansion() {
        std::env::set_var("ONCALL_TEST_SENTRY_TOKEN", "s3cr3t");
        let yaml = "sentry:\n  auth_token: \"${ONCALL_TEST_SENTRY_TOKEN}\"\n  organization_slug: acme\n";
        let config = IntegrationsConfig::from_yaml(yaml).unwrap();
        let sentry = config.sentry.unwrap();
        assert_eq!(sentry.auth_token, "s3cr3t");
        assert_eq!(sentry.organization_slug, "acme");
        assert_eq!(sentry.api_url, "https://sentry.io/api/0/");
    }

    #[test]
    fn test_unset_reference_expands_to_empty() {
        let out = expand_env_vars("token: \"${ONCALL_TEST_DEFINITELY_UNSET}\"");
        assert_eq!(out, "token: \"\"");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  port: 9090\n  action_timeout_secs: 30\nslack:\n  bot_token: xoxb-1"
        )
        .unwrap();
        let config = IntegrationsConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.action_timeout_secs, Some(30));
        assert_eq!(config.slack.unwrap().api_url, "https://slack.com/api/");
    }

    #[test]
    fn test_invalid_yaml() {
        let err = IntegrationsConfig::from_yaml("server: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let debug = format!("{:?}", SentryConfig::new("very-secret", "acme"));
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("acme"));
    }
}
