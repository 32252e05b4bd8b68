//! HTTP remote source.
//!
//! Talks to the catalog REST API with a blocking `reqwest` client. Every
//! failure is classified here so the fetcher only has to decide between
//! retrying, failing the resource and aborting the run.
//!
//! The blocking client owns an internal runtime; build and drop an
//! [`HttpSource`] on a blocking thread, never inside an async task.

use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteSource;
use mirror_catalog::{PageRequest, RemotePage};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.contifico.com/sistema/api/v1";

const MAX_LOGGED_BODY: usize = 512;

/// Connection settings of the remote API.
#[derive(Clone)]
pub struct HttpSourceConfig {
    /// API base URL.
    pub base_url: String,
    /// API key, sent as `Authorization`.
    pub api_key: String,
    /// API token, sent as `X-Api-Token`.
    pub api_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HttpSourceConfig {
    /// Creates settings for the default base URL.
    pub fn new(api_key: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            api_token: api_token.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks that credentials and base URL are present.
    pub fn validate(&self) -> SyncResult<()> {
        if self.api_key.trim().is_empty() || self.api_token.trim().is_empty() {
            return Err(SyncError::config(
                "CONTIFICO_API_KEY and CONTIFICO_API_TOKEN must be set",
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(SyncError::config("API base URL must not be empty"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for HttpSourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSourceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("api_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Remote source backed by the catalog REST API.
#[derive(Debug)]
pub struct HttpSource {
    base_url: String,
    client: Client,
}

impl HttpSource {
    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns `Config` for missing credentials or header values that cannot
    /// be sent, and `Transport` if the client cannot be built.
    pub fn new(config: &HttpSourceConfig) -> SyncResult<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(config.api_key.trim())
            .map_err(|_| SyncError::config("API key contains invalid characters"))?;
        headers.insert(AUTHORIZATION, key);
        let token = HeaderValue::from_str(config.api_token.trim())
            .map_err(|_| SyncError::config("API token contains invalid characters"))?;
        headers.insert("X-Api-Token", token);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::transport_fatal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

impl RemoteSource for HttpSource {
    fn fetch_page(&self, request: &PageRequest) -> SyncResult<RemotePage> {
        let url = self.url_for(&request.endpoint);
        debug!(url = %url, page = request.page, page_size = request.page_size, "requesting page");

        let response = self
            .client
            .get(&url)
            .query(&request.query_params())
            .send()
            .map_err(classify_request_error)?;

        let status = response.status();
        let body = response.text().map_err(classify_request_error)?;

        if !status.is_success() {
            warn!(
                url = %url,
                status = status.as_u16(),
                body = %truncate(&body, MAX_LOGGED_BODY),
                "remote returned an error"
            );
            return Err(classify_status(status.as_u16(), &error_message(&body)));
        }

        if body.trim().is_empty() {
            return RemotePage::from_body(request, None).map_err(SyncError::from);
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            debug!(body = %truncate(&body, MAX_LOGGED_BODY), "undecodable response body");
            SyncError::Protocol(format!("invalid JSON from {}: {e}", request.endpoint))
        })?;
        RemotePage::from_body(request, Some(value)).map_err(SyncError::from)
    }
}

/// Classifies a non-success HTTP status.
///
/// - 401 and 403 are authentication failures
/// - 408, 429 and 5xx are retryable
/// - anything else is a fatal transport error
pub fn classify_status(status: u16, message: &str) -> SyncError {
    match status {
        401 | 403 => SyncError::Authentication(format!("HTTP {status}: {message}")),
        408 | 429 | 500..=599 => SyncError::transport_retryable(format!("HTTP {status}: {message}")),
        _ => SyncError::transport_fatal(format!("HTTP {status}: {message}")),
    }
}

fn classify_request_error(err: reqwest::Error) -> SyncError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        SyncError::transport_retryable(err.to_string())
    } else if err.is_decode() || err.is_body() {
        SyncError::transport_retryable(format!("failed to read response: {err}"))
    } else {
        SyncError::transport_fatal(err.to_string())
    }
}

/// Extracts a human message from an error body.
///
/// Looks for `mensaje`, `message` or `detail` in a JSON object, falls back to
/// the raw text, and finally to a generic message.
pub fn error_message(body: &str) -> String {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) {
        for key in ["mensaje", "message", "detail"] {
            if let Some(text) = object.get(key).and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    return text.trim().to_string();
                }
            }
        }
    }

    let text = body.trim();
    if text.is_empty() {
        "request failed".to_string()
    } else {
        truncate(text, MAX_LOGGED_BODY).to_string()
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
