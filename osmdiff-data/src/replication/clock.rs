//! Injectable time source for retry and catch-up waits.

use std::time::Duration;

use async_trait::async_trait;

/// Suspends the replication loop between attempts.
#[async_trait(?Send)]
pub trait Clock {
    /// Wait for `duration` before the next attempt.
    async fn sleep(&self, duration: Duration);
}

/// [`Clock`] backed by the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait(?Send)]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
