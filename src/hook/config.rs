//! Configuration structures consumed by the hook lifecycle.
//!
//! [`HookBuilder`](super::HookBuilder) validates these values before
//! passing them to [`LogstashHook`](super::LogstashHook) for runtime use.

use std::time::Duration;

use serde::Deserialize;

use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

use super::transport::TlsOptions;

/// Default bounded channel capacity used by the hook.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 8192;
/// Default connection timeout applied when dialling.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default write timeout applied to socket writes.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Default time `flush` waits for the dispatcher.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
/// Default TCP keep-alive period.
pub const DEFAULT_KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(30);
/// Default wait between reconnection attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// What to do with a record when the delivery channel is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Send the record on the producer's thread.
    #[default]
    Synchronous,
    /// Drop the record and emit a rate-limited warning.
    Drop,
}

/// Runtime options for a [`LogstashHook`](super::LogstashHook).
#[derive(Clone, Debug)]
pub struct HookOptions {
    /// Delivery channel capacity; `None` sends every record synchronously.
    pub capacity: Option<usize>,
    /// How long `fire` may wait for room in a full channel.
    pub enqueue_timeout: Duration,
    pub overflow: OverflowPolicy,
    /// TCP keep-alive period; `None` leaves keep-alive disabled.
    pub keep_alive: Option<Duration>,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub flush_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub warn_interval: Duration,
    pub tls: Option<TlsOptions>,
}

impl Default for HookOptions {
    fn default() -> Self {
        Self {
            capacity: Some(DEFAULT_CHANNEL_CAPACITY),
            enqueue_timeout: Duration::ZERO,
            overflow: OverflowPolicy::default(),
            keep_alive: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            backoff: BackoffPolicy::default(),
            warn_interval: DEFAULT_WARN_INTERVAL,
            tls: None,
        }
    }
}

impl HookOptions {
    /// Options that disable the delivery channel.
    pub fn synchronous() -> Self {
        Self {
            capacity: None,
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Enable TCP keep-alive with `period`.
    pub fn with_keep_alive(mut self, period: Duration) -> Self {
        self.keep_alive = Some(period);
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Delay policy between reconnection attempts.
///
/// With `base == cap` (the default) every attempt waits the same interval.
/// A larger `cap` doubles the wait after each failed dial until it reaches
/// the cap. Attempts are never abandoned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    /// Sleep a random duration in `[interval / 2, interval]`.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_INTERVAL)
    }
}

impl BackoffPolicy {
    /// Wait exactly `interval` between attempts.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            base: interval,
            cap: interval,
            jitter: false,
        }
    }

    /// Double the wait from `base` up to `cap`.
    pub fn exponential(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap: cap.max(base),
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}
