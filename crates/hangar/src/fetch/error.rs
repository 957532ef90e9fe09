use thiserror::Error;

use crate::http::HttpError;

/// Maximum number of response body characters kept in a status error.
pub const MAX_ERROR_BODY_CHARS: usize = 512;

/// Errors produced by the rate-limited fetch client.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection-level failure (DNS, TLS, reset, timeout).
    #[error("Network error for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: HttpError,
    },

    /// Upstream answered with a non-2xx status other than 429.
    #[error("HTTP {status} from {url}: {body}")]
    Status { status: u16, url: String, body: String },

    /// Upstream kept answering 429 after every allowed attempt.
    #[error("Rate limited by {url} after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },

    /// Response body did not have the expected shape.
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A GraphQL response carried a non-empty `errors` array.
    #[error("GraphQL errors: {}", messages.join("; "))]
    GraphQl { messages: Vec<String> },

    /// The caller's cancellation token fired.
    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

impl FetchError {
    /// Build a status error, truncating the body for diagnostics.
    pub fn status(status: u16, url: impl Into<String>, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let body = if text.chars().count() > MAX_ERROR_BODY_CHARS {
            let truncated: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            format!("{truncated}...")
        } else {
            text.into_owned()
        };
        Self::Status {
            status,
            url: url.into(),
            body,
        }
    }

    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
