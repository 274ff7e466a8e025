//! Wire formatters and the Logstash formatting front end.
//!
//! Provides the [`WireFormatter`] trait that turns a
//! [`NormalizedRecord`](crate::normalizer::NormalizedRecord) into bytes,
//! alongside a shared trait-object wrapper so one formatter instance can be
//! used from the dispatcher thread and from synchronous callers at once.

use std::{fmt, io, sync::Arc};

use thiserror::Error;

use crate::normalizer::NormalizedRecord;

mod json;
mod logstash;
mod text;

pub use json::{FieldMap, JsonFormatter, TimestampFormat};
pub use logstash::LogstashFormatter;
pub use text::TextFormatter;

/// Errors produced while encoding a record.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Message(String),
}

/// Trait for encoding normalized records into wire bytes.
///
/// Implementors must be thread-safe (`Send + Sync`) because the same
/// formatter serves the dispatcher and any synchronous fallback sends.
pub trait WireFormatter: Send + Sync {
    /// Encode one record, including any trailing delimiter.
    fn format(&self, record: &NormalizedRecord) -> Result<Vec<u8>, FormatError>;
}

/// Shared formatter trait object used across the hook.
#[derive(Clone)]
pub struct SharedFormatter {
    inner: Arc<dyn WireFormatter>,
}

impl SharedFormatter {
    /// Create a shared formatter from an owned formatter implementation.
    pub fn new<F>(formatter: F) -> Self
    where
        F: WireFormatter + 'static,
    {
        let inner: Arc<dyn WireFormatter> = Arc::new(formatter);
        Self { inner }
    }

    /// Wrap an existing shared formatter trait object.
    pub fn from_arc(inner: Arc<dyn WireFormatter>) -> Self {
        Self { inner }
    }
}

impl WireFormatter for SharedFormatter {
    fn format(&self, record: &NormalizedRecord) -> Result<Vec<u8>, FormatError> {
        self.inner.format(record)
    }
}

impl fmt::Debug for SharedFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedFormatter(<dyn WireFormatter>)")
    }
}

impl WireFormatter for Arc<dyn WireFormatter> {
    fn format(&self, record: &NormalizedRecord) -> Result<Vec<u8>, FormatError> {
        (**self).format(record)
    }
}

impl WireFormatter for Box<dyn WireFormatter> {
    fn format(&self, record: &NormalizedRecord) -> Result<Vec<u8>, FormatError> {
        (**self).format(record)
    }
}
