//! Retry policy for transient database failures.
//!
//! Only whole write units are retried: the closure must open its own transaction, so a
//! retry re-runs the unit from scratch. Upstream HTTP errors are never retried here.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use sea_orm::DbErr;

use crate::store::StoreError;

/// Backoff settings for transient database errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: usize,
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            max_retries: 3,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Whether a database error is worth retrying (locked, busy, dropped connection).
pub fn is_transient_db_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(_) | DbErr::Query(_) => {
            let msg = err.to_string().to_lowercase();
            msg.contains("locked")
                || msg.contains("busy")
                || msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("temporarily unavailable")
        }
        _ => false,
    }
}

fn is_transient(err: &StoreError) -> bool {
    match err {
        StoreError::Database(db_err) => is_transient_db_error(db_err),
        _ => false,
    }
}

/// Run a write unit, retrying it on transient database errors.
pub async fn with_db_retry<T, F, Fut>(config: RetryConfig, operation: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    operation
        .retry(config.into_backoff())
        .when(is_transient)
        .notify(|err, dur| {
            tracing::warn!(
                retry_in_ms = dur.as_millis() as u64,
                error = %err,
                "Transient database error, retrying write"
            );
        })
        .await
}
