//! Reconnect delay state machine used by the connection manager.

use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::config::BackoffPolicy;

/// Tracks consecutive failed reconnects and produces the next sleep.
pub struct BackoffState {
    policy: BackoffPolicy,
    current: Duration,
    attempts: u32,
    rng: StdRng,
}

impl BackoffState {
    /// Create a new state machine from the supplied policy.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            current: policy.base,
            attempts: 0,
            rng: StdRng::from_entropy(),
            policy,
        }
    }

    /// Failed reconnects since the last success.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forget previous failures once a redialled connection delivers a frame.
    pub fn record_success(&mut self) {
        self.current = self.policy.base;
        self.attempts = 0;
    }

    /// Record a failed dial and return how long to wait before the next one.
    pub fn next_sleep(&mut self) -> Duration {
        if self.attempts > 0 {
            self.current = self.current.saturating_mul(2).min(self.policy.cap);
        }
        self.attempts = self.attempts.saturating_add(1);

        if !self.policy.jitter {
            return self.current;
        }
        let max_ms = self.current.as_millis().min(u128::from(u64::MAX)) as u64;
        let min_ms = max_ms / 2;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.gen_range(min_ms..=max_ms))
    }
}
