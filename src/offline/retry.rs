//! # Retry Throttling
//!
//! Keeps a still-unreachable or still-failing remote from being hammered.
//! Failed operations are never retried in a loop: they are only attempted
//! again on the next drain trigger (an online transition or a manual sync),
//! and automatic triggers additionally respect a per-operation backoff.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use tenantdesk_offline::offline::BackoffStrategy;
//!
//! let backoff = BackoffStrategy::exponential(Duration::from_secs(2), Duration::from_secs(300));
//! assert_eq!(backoff.delay(1), Duration::from_secs(2));
//! assert_eq!(backoff.delay(3), Duration::from_secs(8));
//! ```

use crate::offline::queue::PendingOperation;
use crate::shared::OfflineConfig;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Backoff strategy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Retry on every trigger
    None,
    /// Fixed interval between attempts
    Fixed {
        /// Minimum time between attempts
        interval: Duration,
    },
    /// Doubling interval per failed attempt
    Exponential {
        /// Delay after the first failure
        base: Duration,
        /// Maximum delay
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Exponential backoff between `base` and `max`
    pub fn exponential(base: Duration, max: Duration) -> Self {
        BackoffStrategy::Exponential { base, max }
    }

    /// Strategy described by the configuration; a zero base disables throttling
    pub fn from_config(config: &OfflineConfig) -> Self {
        if config.retry_base_secs == 0 {
            BackoffStrategy::None
        } else {
            BackoffStrategy::exponential(
                Duration::from_secs(config.retry_base_secs),
                Duration::from_secs(config.retry_max_secs),
            )
        }
    }

    /// Delay required after `attempts` failures
    pub fn delay(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }
        match self {
            BackoffStrategy::None => Duration::ZERO,
            BackoffStrategy::Fixed { interval } => *interval,
            BackoffStrategy::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(attempts.saturating_sub(1).min(31));
                base.saturating_mul(factor).min(*max)
            }
        }
    }

    /// Earliest time `operation` may be attempted again
    pub fn next_attempt_at(&self, operation: &PendingOperation) -> Option<DateTime<Utc>> {
        let last = operation.last_attempt_at?;
        let delay = chrono::Duration::from_std(self.delay(operation.attempts)).ok()?;
        Some(last + delay)
    }

    /// Whether an automatic drain may attempt `operation` at `now`
    pub fn is_due(&self, operation: &PendingOperation, now: DateTime<Utc>) -> bool {
        match self.next_attempt_at(operation) {
            Some(next) => next <= now,
            None => true,
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::exponential(Duration::from_secs(2), Duration::from_secs(300))
    }
}
