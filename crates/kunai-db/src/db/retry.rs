//! Bounded, jittered backoff for re-executing units of work.

use std::time::Duration;

use kunai_core::config::RetryConfig;
use rand::Rng;

/// How often and how patiently a write unit of work is re-executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; at most `max_retries + 1` attempts run.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// ## Summary
    /// Returns the delay before retry number `attempt` (1-based):
    /// `base * attempt + random(0, base)`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let jitter = if base == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..base)
        };
        Duration::from_millis(
            base.saturating_mul(u64::from(attempt))
                .saturating_add(jitter),
        )
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}
