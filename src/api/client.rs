use std::time::Duration;

use log::{debug, warn};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;

use crate::error::FetchError;

/// Used when neither the command line, the config file nor the build sets one.
pub const DEFAULT_API_ROOT: &str = "/api";

/// A decoded response body: JSON when the server says so, text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(serde_json::Value),
    Text(String),
}

pub struct ApiClient {
    base_url: String,
    timeout: Option<Duration>,
    http: Client,
}

/// Joins the origin and API root into a base URL without a trailing slash.
/// An absolute API root wins over the origin.
pub fn join_base(origin: &str, api_root: &str) -> String {
    let api_root = api_root.trim();
    let joined = if api_root.starts_with("http://") || api_root.starts_with("https://") {
        api_root.to_string()
    } else {
        let root = if api_root.is_empty() || api_root.starts_with('/') {
            api_root.to_string()
        } else {
            format!("/{api_root}")
        };
        format!("{}{root}", origin.trim().trim_end_matches('/'))
    };
    joined.trim_end_matches('/').to_string()
}

impl ApiClient {
    /// Page renders can be slow, so requests wait as long as the server takes.
    pub fn new(origin: &str, api_root: &str) -> Result<Self, FetchError> {
        Self::with_timeout(origin, api_root, None)
    }

    pub fn with_timeout(
        origin: &str,
        api_root: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, FetchError> {
        // The blocking client applies 30s unless told otherwise.
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| transport_error(&e))?;
        Ok(Self {
            base_url: join_base(origin, api_root),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    pub fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, FetchError> {
        let url = self.endpoint(path);
        debug!("POST {url}");

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        let text = response
            .text()
            .map_err(|e| transport_error(&e))?;
        debug!("{url} -> {} ({} bytes)", status.as_u16(), text.len());

        if !status.is_success() {
            warn!("{url} failed with {}", status.as_u16());
            return Err(status_error(status, text));
        }

        decode_body(is_json, text)
    }
}

/// The error with each of its causes, outermost first.
pub fn transport_error(err: &dyn std::error::Error) -> FetchError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    FetchError::Transport(message)
}

/// An empty body is replaced by the status reason phrase.
pub fn status_error(status: StatusCode, body: String) -> FetchError {
    let body = if body.is_empty() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        body
    };
    FetchError::Status {
        status: status.as_u16(),
        body,
    }
}

pub fn decode_body(is_json: bool, text: String) -> Result<ApiResponse, FetchError> {
    if !is_json {
        return Ok(ApiResponse::Text(text));
    }
    serde_json::from_str(&text)
        .map(ApiResponse::Json)
        .map_err(|e| FetchError::Decode(e.to_string()))
}
