//! Bounded polling with injectable sleep.
//!
//! Both remote services answer asynchronously: the agent host through run
//! statuses, Genie through message statuses. Callers poll with a
//! [`PollStrategy`] and sleep through a [`Sleeper`] so tests can observe
//! delays without waiting for them.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// Delay schedule and attempt budget for a poll loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollStrategy {
    /// Delay before the first re-poll.
    pub interval: Duration,
    /// Upper bound on any single delay.
    pub max_interval: Duration,
    /// Growth factor applied per attempt (1.0 = fixed interval).
    pub multiplier: f64,
    /// Maximum number of polls before giving up.
    pub max_attempts: u32,
}

impl PollStrategy {
    /// Fixed-interval strategy.
    #[must_use]
    pub const fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_interval: interval,
            multiplier: 1.0,
            max_attempts,
        }
    }

    /// Returns the delay to wait before poll number `attempt` (zero-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let scaled = self.interval.as_nanos() as f64 * self.multiplier.max(1.0).powi(exp);
        #[allow(clippy::cast_precision_loss)]
        let cap = self.max_interval.as_nanos() as f64;
        if !scaled.is_finite() || scaled >= cap {
            return self.max_interval;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let nanos = scaled as u64;
        Duration::from_nanos(nanos)
    }
}

impl Default for PollStrategy {
    /// One second, growing by half up to five seconds, for 300 polls (about 25 minutes).
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(5),
            multiplier: 1.5,
            max_attempts: 300,
        }
    }
}

/// Something that can wait.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Waits for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and records every requested delay.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
    }
}
