//! Logstash delivery hook.
//!
//! This module defines [`LogstashHook`], a hook that normalizes
//! [`LogRecord`](crate::log_record::LogRecord) values, encodes them with a
//! [`WireFormatter`](crate::formatter::WireFormatter) and forwards them to
//! a remote collector. A single dispatcher thread drains a bounded channel
//! and owns the write path; the shared connection is re-dialled with a
//! fixed (or capped exponential) backoff whenever a write fails for any
//! reason other than a timeout.

mod backoff;
mod builder;
mod config;
mod connection;
mod dispatcher;
mod handler;
mod transport;


pub use builder::{BackoffOverrides, FormatterKind, HookBuilder, HookSettings};
pub use config::{
    BackoffPolicy, DEFAULT_CHANNEL_CAPACITY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_FLUSH_TIMEOUT,
    DEFAULT_KEEP_ALIVE_PERIOD, DEFAULT_RECONNECT_INTERVAL, DEFAULT_WRITE_TIMEOUT, HookOptions,
    OverflowPolicy,
};
pub use connection::ConnectionState;
pub use handler::LogstashHook;
pub use transport::{Connect, Connection, Endpoint, Protocol, TlsOptions};
