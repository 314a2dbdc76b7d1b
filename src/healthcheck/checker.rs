use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Readiness probe for a service endpoint
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Check if the service is ready
    async fn check(&self) -> Result<bool>;

    /// Per-attempt timeout
    fn timeout(&self) -> Duration;
}

/// Cap on the delay between attempts.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Poll until the checker reports ready or `deadline` elapses.
///
/// Starts with `interval` and doubles each retry up to a maximum of 30 seconds.
/// The last sleep is shortened so the call never overshoots the deadline by more
/// than one attempt.
pub async fn check_until<C: HealthChecker + ?Sized>(
    checker: &C,
    deadline: Duration,
    interval: Duration,
) -> bool {
    let start = Instant::now();
    let mut current_delay = interval;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if let Ok(true) = checker.check().await {
            if attempt > 1 {
                tracing::debug!("Ready after {} attempts ({:?})", attempt, start.elapsed());
            }
            return true;
        }

        let remaining = deadline.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return false;
        }
        sleep(current_delay.min(remaining)).await;
        current_delay = std::cmp::min(current_delay * 2, MAX_DELAY);
    }
}
