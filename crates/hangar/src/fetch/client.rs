use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::http::{HttpRequest, HttpResponse, HttpTransport};

use super::error::{FetchError, Result};
use super::rate_limit::ApiRateLimiter;

/// Total attempts for a request answered with 429, including the first.
pub const MAX_RATE_LIMIT_ATTEMPTS: u32 = 3;

/// Wait used when a 429 response has no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// Upper bound on a server-provided `Retry-After`.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Rate-limited HTTP client shared by all source adapters.
///
/// Every attempt, retries included, takes a permit from the shared [`ApiRateLimiter`]
/// first. A 429 is retried up to [`MAX_RATE_LIMIT_ATTEMPTS`] times; any other non-2xx
/// status fails immediately.
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn HttpTransport>,
    limiter: ApiRateLimiter,
    default_retry_after: Duration,
}

impl FetchClient {
    pub fn new(transport: Arc<dyn HttpTransport>, limiter: ApiRateLimiter) -> Self {
        Self {
            transport,
            limiter,
            default_retry_after: DEFAULT_RETRY_AFTER,
        }
    }

    /// Override the fallback wait used when `Retry-After` is absent.
    #[must_use]
    pub fn with_default_retry_after(mut self, wait: Duration) -> Self {
        self.default_retry_after = wait;
        self
    }

    pub fn limiter(&self) -> &ApiRateLimiter {
        &self.limiter
    }

    /// GET `url` and return the raw body.
    pub async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        let response = self.send(HttpRequest::get(url), cancel).await?;
        Ok(response.body)
    }

    /// GET `url` with extra headers and return the raw body.
    pub async fn fetch_with_headers(
        &self,
        url: &str,
        headers: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let mut request = HttpRequest::get(url);
        request.headers.extend(headers.iter().cloned());
        let response = self.send(request, cancel).await?;
        Ok(response.body)
    }

    /// GET `url` and decode the body as JSON.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let body = self.fetch(url, cancel).await?;
        decode(url, &body)
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let payload = serde_json::to_vec(body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })?;
        let response = self
            .send(HttpRequest::post_json(url, payload), cancel)
            .await?;
        decode(url, &response.body)
    }

    /// Send a request through the limiter with bounded 429 retry.
    pub async fn send(
        &self,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let url = request.url.clone();

        for attempt in 1..=MAX_RATE_LIMIT_ATTEMPTS {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            self.limiter.acquire(cancel).await?;

            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                result = self.transport.send(request.clone()) => result,
            };
            let response = sent.map_err(|source| FetchError::Network {
                url: url.clone(),
                source,
            })?;

            if response.status == 429 {
                if attempt == MAX_RATE_LIMIT_ATTEMPTS {
                    break;
                }
                let wait = self.retry_after(&response);
                tracing::warn!(
                    url = %url,
                    attempt,
                    retry_after_ms = wait.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    _ = tokio::time::sleep(wait) => {}
                }
                continue;
            }

            if !response.is_success() {
                return Err(FetchError::status(response.status, url, &response.body));
            }

            tracing::trace!(url = %url, status = response.status, bytes = response.body.len(), "Fetched");
            return Ok(response);
        }

        Err(FetchError::RateLimited {
            url,
            attempts: MAX_RATE_LIMIT_ATTEMPTS,
        })
    }

    fn retry_after(&self, response: &HttpResponse) -> Duration {
        response
            .header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
            .unwrap_or(self.default_retry_after)
    }
}

pub(crate) fn decode<T: DeserializeOwned>(url: &str, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, MockTransport};

    fn client(transport: &MockTransport) -> FetchClient {
        FetchClient::new(Arc::new(transport.clone()), ApiRateLimiter::unlimited())
    }

    fn too_many(retry_after: Option<&str>) -> HttpResponse {
        HttpResponse {
            status: 429,
            headers: retry_after
                .map(|v| vec![("Retry-After".to_string(), v.to_string())])
                .unwrap_or_default(),
            body: b"slow down".to_vec(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_429_honoring_retry_after_then_succeeds() {
        let transport = MockTransport::new();
        let url = "https://api.test/things";
        transport.push_response(HttpMethod::Get, url, too_many(Some("7")));
        transport.push_json(url, &serde_json::json!({"ok": true}));

        let started = tokio::time::Instant::now();
        let value: serde_json::Value = client(&transport)
            .fetch_json(url, &CancellationToken::new())
            .await
            .expect("should succeed after one retry");

        assert_eq!(value["ok"], true);
        assert_eq!(transport.requests().len(), 2);
        assert!(started.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_retry_after_uses_default_wait() {
        let transport = MockTransport::new();
        let url = "https://api.test/things";
        transport.push_response(HttpMethod::Get, url, too_many(None));
        transport.push_json(url, &serde_json::json!([]));

        let started = tokio::time::Instant::now();
        client(&transport)
            .with_default_retry_after(Duration::from_secs(3))
            .fetch(url, &CancellationToken::new())
            .await
            .expect("should succeed");

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_attempts() {
        let transport = MockTransport::new();
        let url = "https://api.test/things";
        transport.push_response(HttpMethod::Get, url, too_many(Some("1")));

        let err = client(&transport)
            .fetch(url, &CancellationToken::new())
            .await
            .expect_err("should exhaust retries");

        assert!(err.is_rate_limited());
        assert_eq!(transport.requests().len(), MAX_RATE_LIMIT_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn non_429_errors_fail_immediately() {
        let transport = MockTransport::new();
        let url = "https://api.test/broken";
        transport.push_response(
            HttpMethod::Get,
            url,
            HttpResponse {
                status: 503,
                headers: Vec::new(),
                body: b"maintenance".to_vec(),
            },
        );

        let err = client(&transport)
            .fetch(url, &CancellationToken::new())
            .await
            .expect_err("503 should fail");

        match err {
            FetchError::Status { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_maps_to_network_error() {
        let transport = MockTransport::new();
        let err = client(&transport)
            .fetch("https://api.test/unregistered", &CancellationToken::new())
            .await
            .expect_err("no route should fail");
        assert!(matches!(err, FetchError::Network { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff_sleep() {
        let transport = MockTransport::new();
        let url = "https://api.test/things";
        transport.push_response(HttpMethod::Get, url, too_many(Some("60")));

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = client(&transport)
            .fetch(url, &cancel)
            .await
            .expect_err("should be cancelled");

        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn decode_failure_reports_url() {
        let transport = MockTransport::new();
        let url = "https://api.test/garbage";
        transport.push_response(
            HttpMethod::Get,
            url,
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: b"<html>".to_vec(),
            },
        );

        let err = client(&transport)
            .fetch_json::<serde_json::Value>(url, &CancellationToken::new())
            .await
            .expect_err("html is not json");
        match err {
            FetchError::Decode { url: failed, .. } => assert_eq!(failed, url),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
