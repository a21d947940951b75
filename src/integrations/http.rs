//! Shared JSON-over-HTTP client for the integrations.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed with status {status}: {body}")]
    Status { status: u16, url: String, body: String },

    #[error("Invalid header {0}")]
    InvalidHeader(String),

    #[error("API error: {0}")]
    Api(String),
}

/// A reqwest client bound to one API base URL with fixed default headers.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client. `headers` are sent with every request.
    pub fn new(base_url: impl Into<String>, headers: &[(&str, String)]) -> Result<Self, ApiError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::InvalidHeader(name.to_string()))?;
            let mut header_value = HeaderValue::from_str(value)
                .map_err(|_| ApiError::InvalidHeader(name.to_string()))?;
            if header_name == reqwest::header::AUTHORIZATION {
                header_value.set_sensitive(true);
            }
            default_headers.insert(header_name, header_value);
        }

        let http = reqwest::Client::builder()
            .default_headers(default_headers)
            .user_agent(concat!("oncall-integrations/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join an endpoint onto the base URL without doubling slashes.
    pub fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// GET `endpoint` with query parameters and decode the JSON body.
    pub async fn get_json(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ApiError> {
        let url = self.url(endpoint);
        log::debug!("GET {}", url);

        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Request to {} failed with status {}: {}", url, status, body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join() {
        let client = ApiClient::new("https://sentry.io/api/0/", &[]).unwrap();
        assert_eq!(
            client.url("/organizations/acme/"),
            "https://sentry.io/api/0/organizations/acme/"
        );
        let client = ApiClient::new("https://api.github.com", &[]).unwrap();
        assert_eq!(client.url("repos/a/b"), "https://api.github.com/repos/a/b");
    }

    #[test]
    fn test_invalid_header_rejected() {
        let err = ApiClient::new("https://x", &[("Authorization", "Bearer \n".to_string())])
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidHeader(_)));
    }
}
