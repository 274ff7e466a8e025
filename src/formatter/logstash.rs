//! Normalize-then-encode front end used by the hook.

use std::fmt;

use super::{FormatError, JsonFormatter, SharedFormatter, WireFormatter};
use crate::{
    log_record::{Fields, LogRecord},
    normalizer::{NormalizedRecord, logstash_defaults, normalize_into},
};

/// Pairs a [`WireFormatter`] with the default attributes added to every
/// record before encoding.
#[derive(Clone)]
pub struct LogstashFormatter {
    formatter: SharedFormatter,
    fields: Fields,
}

impl LogstashFormatter {
    /// Use `formatter` with `fields` as defaults, without the baseline
    /// `@version`/`type` attributes.
    pub fn new<F>(formatter: F, fields: Fields) -> Self
    where
        F: WireFormatter + 'static,
    {
        Self {
            formatter: SharedFormatter::new(formatter),
            fields,
        }
    }

    /// The default Logstash layout: JSON with `@timestamp` and `message`
    /// keys, RFC 3339 nanosecond timestamps, and `@version = "1"` /
    /// `type = "log"` unless `fields` sets them.
    pub fn logstash(fields: Fields) -> Self {
        Self {
            formatter: SharedFormatter::new(JsonFormatter::logstash()),
            fields: logstash_defaults(&fields),
        }
    }

    /// Defaults merged into every record.
    pub fn defaults(&self) -> &Fields {
        &self.fields
    }

    /// Normalize `record` into `scratch` and encode it.
    pub fn format_into(
        &self,
        record: &LogRecord,
        scratch: &mut NormalizedRecord,
    ) -> Result<Vec<u8>, FormatError> {
        normalize_into(record, &self.fields, scratch);
        self.formatter.format(scratch)
    }

    /// Normalize and encode `record` using a fresh normalized record.
    pub fn format(&self, record: &LogRecord) -> Result<Vec<u8>, FormatError> {
        self.format_into(record, &mut NormalizedRecord::default())
    }
}

impl Default for LogstashFormatter {
    fn default() -> Self {
        Self::logstash(Fields::new())
    }
}

impl<F> From<F> for LogstashFormatter
where
    F: WireFormatter + 'static,
{
    fn from(formatter: F) -> Self {
        Self::new(formatter, Fields::new())
    }
}

impl fmt::Debug for LogstashFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogstashFormatter")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
