//! HTTP transport for feature-service queries.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{LAST_MODIFIED, USER_AGENT};
use tracing::debug;

use crate::error::FetchError;

/// Default user agent for outgoing requests.
pub const DEFAULT_USER_AGENT: &str = concat!("rki-states/", env!("CARGO_PKG_VERSION"));

/// A response as received, before any decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// The URL the request was sent to.
    pub url: String,

    /// HTTP status code.
    pub status: u16,

    /// The `Last-Modified` header, if present.
    pub last_modified: Option<String>,

    /// Response body.
    pub body: String,
}

/// Issues GET requests.
///
/// Only failures to obtain a response are errors here; status codes and
/// provider error bodies are interpreted by [`super::arcgis::decode`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url`.
    async fn get(&self, url: &str) -> Result<RawResponse, FetchError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpTransport {
    /// Create a transport with a request timeout and user agent.
    pub fn new(timeout: Duration, user_agent: &str) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, user_agent))
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client, user_agent: &str) -> Self {
        Self {
            client,
            user_agent: user_agent.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status().as_u16();
        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

        debug!(url, status, bytes = body.len(), "Received response");

        Ok(RawResponse {
            url: url.to_string(),
            status,
            last_modified,
            body,
        })
    }
}

/// [`Transport`] serving canned responses keyed by exact URL.
///
/// Unknown URLs answer 404 with an empty body. Every requested URL is
/// recorded, in order.
#[derive(Debug, Default)]
pub struct StaticTransport {
    responses: HashMap<String, RawResponse>,
    requests: Mutex<Vec<String>>,
}

impl StaticTransport {
    /// An empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 for `url`.
    pub fn with_json(self, url: impl Into<String>, body: serde_json::Value) -> Self {
        self.with_response(RawResponse {
            url: url.into(),
            status: 200,
            last_modified: None,
            body: body.to_string(),
        })
    }

    /// Serve `response` for `response.url`.
    pub fn with_response(mut self, response: RawResponse) -> Self {
        self.responses.insert(response.url.clone(), response);
        self
    }

    /// URLs requested so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Transport for StaticTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(url.to_string());

        Ok(self.responses.get(url).cloned().unwrap_or_else(|| RawResponse {
            url: url.to_string(),
            status: 404,
            last_modified: None,
            body: String::new(),
        }))
    }
}
