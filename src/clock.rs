//! Timer abstraction driving the step-wise workflows.
//!
//! Long-running operations (resync, evacuation, upgrade, rebalancing) are
//! modeled as multi-step state progressions: each step mutates shared state,
//! yields through [`Clock::sleep`], and resumes after the configured delay.
//! Tests swap in [`NoopClock`] so workflows run to completion synchronously.

use async_trait::async_trait;
use std::time::Duration;

/// Source of simulated delays.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Test double that never waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopClock;

#[async_trait]
impl Clock for NoopClock {
    async fn sleep(&self, _duration: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_noop_clock_does_not_wait() {
        let clock = NoopClock;
        let start = Instant::now();
        clock.sleep(Duration::from_secs(60)).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_tokio_clock_skips_zero_sleep() {
        let clock = TokioClock;
        let start = Instant::now();
        clock.sleep(Duration::ZERO).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
