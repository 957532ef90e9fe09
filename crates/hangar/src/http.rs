//! Transport boundary for all outbound HTTP I/O.
//!
//! Every upstream call made by the engine goes through [`HttpTransport`]. Production code uses
//! [`reqwest_transport::ReqwestTransport`]; tests use the in-memory [`MockTransport`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

/// HTTP methods the engine issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// HTTP headers represented as key/value pairs.
///
/// Header names are treated case-insensitively by helper functions.
pub type HttpHeaders = Vec<(String, String)>;

/// A minimal HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// A GET request with no headers.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// A POST request carrying a JSON body.
    #[must_use]
    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A minimal HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("no mock response registered for {method} {url}")]
    NoMockResponse { method: String, url: String },
}

/// Transport boundary for all HTTP I/O.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Get the first header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub mod reqwest_transport {
    use super::*;

    use std::time::Duration as StdDuration;

    /// User agent sent with every upstream request.
    pub const USER_AGENT: &str = concat!("hangar/", env!("CARGO_PKG_VERSION"));

    /// A real HTTP transport backed by reqwest.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        pub fn with_timeout(timeout: StdDuration) -> Result<Self, HttpError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .build()
                .map_err(|e| HttpError::Transport(e.to_string()))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
            };

            let mut builder = self.client.request(method, &request.url);
            for (k, v) in request.headers {
                builder = builder.header(&k, &v);
            }

            if !request.body.is_empty() {
                builder = builder.body(request.body);
            }

            let resp = builder
                .send()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?;

            let status = resp.status().as_u16();
            let headers: HttpHeaders = resp
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_string(),
                        value.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect();

            let body = resp
                .bytes()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?
                .to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

// ---------- In-memory mock transport ----------

/// In-memory transport for tests and offline fixtures.
///
/// No sockets, no loopback servers. Responses are registered per method + URL and
/// returned in FIFO order; a key whose queue holds exactly one response keeps serving it,
/// so fixtures can be replayed across repeated sync runs.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Default)]
struct MockTransportInner {
    routes: HashMap<(HttpMethod, String), VecDeque<HttpResponse>>,
    requests: Vec<HttpRequest>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for a method + URL.
    pub fn push_response(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        response: HttpResponse,
    ) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .routes
            .entry((method, url.into()))
            .or_default()
            .push_back(response);
    }

    /// Register a `200 OK` JSON response for a GET.
    pub fn push_json(&self, url: impl Into<String>, body: &serde_json::Value) {
        self.push_response(HttpMethod::Get, url, HttpResponse::json(200, body));
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.requests.clone()
    }
}

impl HttpResponse {
    /// Build a JSON response.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: body.to_string().into_bytes(),
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let key = (request.method, request.url.clone());
        inner.requests.push(request);

        let response = match inner.routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        response.ok_or_else(|| HttpError::NoMockResponse {
            method: key.0.as_str().to_string(),
            url: key.1,
        })
    }
}
