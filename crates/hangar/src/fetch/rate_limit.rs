use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::error::{FetchError, Result};

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default sustained request rate.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 5;
/// Default bucket capacity.
pub const DEFAULT_BURST: u32 = 10;

/// Token-bucket parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst: DEFAULT_BURST,
        }
    }
}

/// Shared token-bucket limiter for every outbound request.
///
/// One instance is created per engine and cloned into each adapter; clones share the same
/// bucket. The bucket holds up to `burst` permits and refills at `requests_per_second`.
///
/// ```ignore
/// let limiter = ApiRateLimiter::new(RateLimitConfig { requests_per_second: 5, burst: 10 });
/// limiter.acquire(&cancel).await?;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Option<Arc<GovernorRateLimiter>>,
}

impl ApiRateLimiter {
    /// Create a limiter. Zero values are clamped to 1.
    pub fn new(config: RateLimitConfig) -> Self {
        let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(rps).allow_burst(burst);

        Self {
            inner: Some(Arc::new(RateLimiter::direct(quota))),
        }
    }

    /// A limiter that never waits. Used by tests.
    pub fn unlimited() -> Self {
        Self { inner: None }
    }

    /// Wait for a permit, returning early if `cancel` fires.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<()> {
        let Some(inner) = &self.inner else {
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            _ = inner.until_ready() => Ok(()),
        }
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter")
            .field("limited", &self.inner.is_some())
            .finish()
    }
}
