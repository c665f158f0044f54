//! Fixed-interval waiting policies for eventually-consistent provider state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Repeatedly check a resource until it reports ready
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Wait between checks
    pub interval: Duration,
    /// Maximum number of checks; `None` polls until the resource is ready
    pub max_checks: Option<u32>,
    /// Print a reminder every this many checks
    pub reminder_every: u32,
}

impl PollPolicy {
    pub const fn new(interval: Duration, max_checks: Option<u32>) -> Self {
        Self {
            interval,
            max_checks,
            reminder_every: 4,
        }
    }

    /// Whether another check is allowed after `checks` have been made
    pub fn allows_another(&self, checks: u32) -> bool {
        self.max_checks.is_none_or(|max| checks < max)
    }

    pub fn is_reminder(&self, check: u32) -> bool {
        self.reminder_every > 0 && check % self.reminder_every == 0
    }
}

impl Default for PollPolicy {
    /// RDS instances take several minutes; check every 15 s for up to an hour.
    fn default() -> Self {
        Self::new(Duration::from_secs(15), Some(240))
    }
}

/// Retry a call that fails while the target is busy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Wait before each retry
    pub interval: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
}

impl RetryPolicy {
    pub const fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
        }
    }

    /// Total calls made before giving up
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Whether attempt number `attempt` (0-based) may be followed by another
    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

impl Default for RetryPolicy {
    /// Environment updates: 30 s apart, 20 retries (about ten minutes).
    fn default() -> Self {
        Self::new(Duration::from_secs(30), 20)
    }
}
