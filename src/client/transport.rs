//! HTTP transport seam.
//!
//! The retrieval core only needs "send this GET, give me status, headers and
//! body". [`Transport`] captures that contract so the executor can run against
//! reqwest in production and a scripted mock in tests.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A GET request ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// Value of a query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// What came back
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercased
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add a header (name is lowercased)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Transport-level failure: no HTTP status was received
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}

/// Sends one GET request
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// reqwest-backed transport with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Arc<Client>,
}

impl HttpTransport {
    /// Create a transport with the crate user agent
    pub fn new() -> Result<Self, TransportError> {
        Self::with_user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
    }

    /// Create a transport with a custom user agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| TransportError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .get(&request.url)
            .query(&request.params)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = HttpResponse::new(200, "{}").with_header("X-RateLimit-Remaining", "42");
        assert_eq!(response.header("x-ratelimit-remaining"), Some("42"));
        assert_eq!(response.header("X-RATELIMIT-REMAINING"), Some("42"));
        assert_eq!(response.header("retry-after"), None);
    }

    #[test]
    fn test_request_param_lookup() {
        let request = HttpRequest {
            url: "http://localhost/search/query".into(),
            headers: Vec::new(),
            params: vec![("q".into(), "bibcode:X".into()), ("rows".into(), "1".into())],
            timeout: Duration::from_secs(5),
        };
        assert_eq!(request.param("rows"), Some("1"));
        assert_eq!(request.param("start"), None);
    }

    #[test]
    fn test_transport_builds() {
        assert!(HttpTransport::new().is_ok());
    }
}
