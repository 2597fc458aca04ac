// ABOUTME: Linear capped backoff with a retry ceiling for backend reconnection.
// ABOUTME: The link supervisor advances it; exhausting it is terminal.

use std::time::Duration;

/// Reconnection policy: delay = min(retry * base, cap), at most `max_retries` retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            cap: Duration::from_millis(3000),
            max_retries: 10,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (1-based), or `None` once the
    /// ceiling is exceeded.
    pub fn delay_for(&self, retry: u32) -> Option<Duration> {
        if retry > self.max_retries {
            return None;
        }
        Some(self.base.saturating_mul(retry).min(self.cap))
    }
}

/// Consecutive-failure counter driven by the link supervisor.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    retries: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, retries: 0 }
    }

    /// Count one more retry and return how long to wait before it.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.retries = self.retries.saturating_add(1);
        self.policy.delay_for(self.retries)
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn reset(&mut self) {
        self.retries = 0;
    }
}
