//! HTTP client utilities for JSON services.
//!
//! This module provides:
//! - Client configuration builders
//! - JSON request helpers (GET/POST/PUT/DELETE) rooted at a base URL
//! - Normalization of service error payloads into one readable message
//!
//! Requests are sent exactly once. Retrying is a policy decision of the
//! caller: reads may be retried, mutations must not be (a retried create
//! could be applied twice).
//!
//! # Example
//!
//! ```rust,ignore
//! use utils::client::{ClientConfig, HttpClient};
//!
//! let config = ClientConfig::new("http://localhost:5147")
//!     .with_timeout(Duration::from_secs(30));
//!
//! let client = HttpClient::new(config)?;
//! let tasks: Vec<Task> = client.get_json("/tasks").await?;
//! ```

use crate::error::{Result, UtilsError};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Configuration for HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every request path is appended to.
    pub base_url: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: Option<String>,

    /// Default headers to include in all requests.
    #[serde(skip)]
    pub default_headers: Vec<(String, String)>,
}

impl ClientConfig {
    /// Create a new client configuration for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: default_timeout(),
            user_agent: None,
            default_headers: Vec::new(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add a default header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((key.into(), value.into()));
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// JSON HTTP client bound to one service base URL.
#[derive(Debug, Clone)]
pub struct HttpClient {
    config: ClientConfig,
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(UtilsError::InvalidInput("base URL must not be empty".to_string()));
        }

        let mut builder = Client::builder().timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }

        let client = builder.build()?;

        Ok(Self { config, client })
    }

    /// The configured base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Join a request path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// GET a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.send(self.request(Method::GET, path)).await?;
        decode_required(body)
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(self.request(Method::POST, path).json(body)).await?;
        decode_required(body)
    }

    /// PUT a JSON body.
    ///
    /// Returns `None` when the service answers without a body (204).
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self.send(self.request(Method::PUT, path).json(body)).await?;
        body.map(|bytes| serde_json::from_slice(&bytes).map_err(UtilsError::from))
            .transpose()
    }

    /// DELETE a resource, ignoring any response body.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .client
            .request(method, self.url(path))
            .header("Content-Type", "application/json");

        for (key, value) in &self.config.default_headers {
            req = req.header(key, value);
        }

        req
    }

    /// Send a request once; `Ok(None)` means success without a body.
    async fn send(&self, req: RequestBuilder) -> Result<Option<Vec<u8>>> {
        let response = req.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "Received response");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = normalize_error_body(
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                &text,
            );
            return Err(UtilsError::StatusError {
                status: status.as_u16(),
                message,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            Ok(None)
        } else {
            Ok(Some(bytes.to_vec()))
        }
    }
}

fn decode_required<T: DeserializeOwned>(body: Option<Vec<u8>>) -> Result<T> {
    let bytes = body.ok_or_else(|| {
        UtilsError::SerializationError("expected a response body, got none".to_string())
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Collapse an error response body into one human-readable message.
///
/// Recognized shapes, in order of preference:
/// - `{"errors": {"Field": ["msg", ...], ...}}` - messages joined with ", "
/// - `{"title": "..."}` or `{"message": "..."}`
/// - a bare JSON string
/// - any other non-empty text, verbatim
///
/// Anything else falls back to `API Error: {status} {reason}`.
pub fn normalize_error_body(status: u16, reason: &str, body: &str) -> String {
    let fallback = format!("API Error: {} {}", status, reason).trim_end().to_string();
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return fallback;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => {
            if let Some(Value::Object(errors)) = map.get("errors") {
                let messages: Vec<&str> = errors
                    .values()
                    .flat_map(|value| match value {
                        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                        Value::String(message) => vec![message.as_str()],
                        _ => Vec::new(),
                    })
                    .collect();
                if !messages.is_empty() {
                    return messages.join(", ");
                }
            }

            ["title", "message"]
                .iter()
                .find_map(|field| map.get(*field).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or(fallback)
        }
        Ok(Value::String(message)) => message,
        Ok(_) => fallback,
        Err(_) => trimmed.to_string(),
    }
}
