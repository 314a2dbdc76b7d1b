//! HTTP readiness checks.
//!
//! Migration steps that talk to a service first wait for it to answer. The
//! [`RetryingWaiter`] polls an endpoint with exponential backoff until it
//! returns 2xx or the caller's timeout runs out.

mod checker;
pub mod http;

pub use checker::{check_until, HealthChecker};
pub use http::HttpChecker;

use crate::error::{Error, Result};
use crate::migration::HttpWaiter;
use async_trait::async_trait;
use std::time::Duration;

/// [`HttpWaiter`] backed by [`HttpChecker`].
#[derive(Debug, Clone)]
pub struct RetryingWaiter {
    interval: Duration,
    request_timeout: Duration,
}

impl RetryingWaiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            request_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for RetryingWaiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl HttpWaiter for RetryingWaiter {
    async fn wait_ready(&self, url: &str, timeout: Duration) -> Result<()> {
        let checker = HttpChecker::new(url.to_string(), self.request_timeout.min(timeout))?;
        tracing::info!("Waiting for {}...", url);
        if check_until(&checker, timeout, self.interval).await {
            Ok(())
        } else {
            Err(Error::Timeout(url.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_ready_times_out() {
        let waiter = RetryingWaiter::new(Duration::from_millis(50))
            .with_request_timeout(Duration::from_millis(100));
        let err = waiter
            .wait_ready("http://localhost:59995/ping", Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(ref url) if url.ends_with("/ping")));
    }

    #[tokio::test]
    async fn test_wait_ready_rejects_bad_url() {
        let err = RetryingWaiter::default()
            .wait_ready("localhost:80", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
