//! Retry configuration for ledger calls.

use crate::utils::retry::{DEFAULT_DELAY, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, self.delay)
    }
}
