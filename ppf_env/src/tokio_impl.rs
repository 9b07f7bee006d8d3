//! Wall-clock TimelineContext on top of tokio's timer.

use crate::TimelineContext;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Session clock backed by the OS monotonic clock.
///
/// Time zero is the moment the context was created, so `now()` reads as
/// session time just like the simulated clock does.
#[derive(Debug, Clone, Copy)]
pub struct TokioContext {
    session_start: Instant,
}

impl TokioContext {
    pub fn new() -> Self {
        Self {
            session_start: Instant::now(),
        }
    }

    /// Sleeps until `at` session time. Returns immediately if that moment
    /// already passed (a frame that ran long is not made up for).
    pub async fn sleep_until(&self, at: Duration) {
        tokio::time::sleep_until(self.session_start + at).await;
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TimelineContext for TokioContext {
    fn now(&self) -> Duration {
        self.session_start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Wall-clock sessions are not reproducible.
    fn seed(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sleep_advances_session_time() {
        let ctx = TokioContext::new();
        let before = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;

        assert!(ctx.now() - before >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_sleep_until_reaches_deadline() {
        let ctx = TokioContext::new();
        ctx.sleep_until(Duration::from_millis(15)).await;
        assert!(ctx.now() >= Duration::from_millis(15));

        // A deadline in the past doesn't block
        let before = ctx.now();
        ctx.sleep_until(Duration::ZERO).await;
        assert!(ctx.now() - before < Duration::from_secs(1));
    }

    #[test]
    fn test_not_seeded() {
        assert_eq!(TokioContext::default().seed(), 0);
    }
}
