//! Ship structured log records to a Logstash collector.
//!
//! [`LogstashHook`] is fired by the surrounding logging framework once per
//! record. Records are queued on a bounded channel and written by a single
//! dispatcher thread, which reconnects and resends when the collector goes
//! away. When the channel is full, or disabled, records are shipped on the
//! caller's thread instead.

pub mod formatter;
pub mod handler;
pub mod hook;
pub mod level;
pub mod log_record;
pub mod normalizer;
pub mod rate_limited_warner;

pub use formatter::{
    FieldMap, FormatError, JsonFormatter, LogstashFormatter, SharedFormatter, TextFormatter,
    TimestampFormat, WireFormatter,
};
pub use handler::{Hook, HookError, SendError};
pub use hook::{
    BackoffOverrides, BackoffPolicy, Connect, Connection, ConnectionState, Endpoint,
    FormatterKind, HookBuilder, HookOptions, HookSettings, LogstashHook, OverflowPolicy,
    Protocol, TlsOptions,
};
pub use level::{Level, ParseLevelError};
pub use log_record::{CallSite, Fields, LogRecord};
pub use normalizer::{NormalizedRecord, logstash_defaults, normalize, normalize_into};
