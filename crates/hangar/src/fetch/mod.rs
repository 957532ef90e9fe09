//! Rate-limited fetch client.
//!
//! All adapters share one [`FetchClient`], and through it one [`ApiRateLimiter`].

mod client;
mod error;
mod pagination;
mod rate_limit;

pub use client::{DEFAULT_RETRY_AFTER, FetchClient, MAX_RATE_LIMIT_ATTEMPTS};
pub use error::{FetchError, MAX_ERROR_BODY_CHARS, Result};
pub use pagination::{DEFAULT_PAGE_SIZE, Page, PageMeta, page_url};
pub use rate_limit::{ApiRateLimiter, DEFAULT_BURST, DEFAULT_REQUESTS_PER_SECOND, RateLimitConfig};
