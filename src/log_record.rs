//! Log record representation handed to the hook by the logging framework.
//!
//! A [`LogRecord`] carries the message, level, and timestamp of one event
//! together with an unordered map of ad-hoc attributes and, when the emitting
//! logger captures call sites, the location that produced it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::level::Level;

/// Attribute map attached to records and used for hook defaults.
pub type Fields = BTreeMap<String, Value>;

/// Source location of a log call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSite {
    /// Source file of the log call.
    pub file: String,
    /// Line number in the source file.
    pub line: u32,
    /// Fully qualified function name.
    pub function: String,
}

impl CallSite {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LogRecord {
    /// The log message content.
    pub message: String,
    /// Severity of the event.
    pub level: Level,
    /// Time the record was created.
    pub timestamp: DateTime<Utc>,
    /// Structured key-value pairs attached to the record.
    pub fields: Fields,
    /// Location of the log call, if captured.
    pub call_site: Option<CallSite>,
    /// Whether the emitting logger reports call sites.
    pub report_caller: bool,
}

impl LogRecord {
    /// Construct a record stamped with the current time.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level,
            timestamp: Utc::now(),
            fields: Fields::new(),
            call_site: None,
            report_caller: false,
        }
    }

    /// Attach one attribute, replacing any previous value under `key`.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Replace the attribute map.
    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach a call site and mark the record as coming from a logger that
    /// reports callers.
    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = Some(call_site);
        self.report_caller = true;
        self
    }

    pub fn with_report_caller(mut self, report_caller: bool) -> Self {
        self.report_caller = report_caller;
        self
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.level, self.message)
    }
}

/// Render an attribute value the way it appears in `key=value` text.
///
/// Strings are written bare; every other value uses its compact JSON form.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!("bob"), "bob")]
    #[case(json!(123), "123")]
    #[case(json!(true), "true")]
    #[case(json!(null), "null")]
    #[case(json!(["a", 1]), r#"["a",1]"#)]
    fn renders_values_for_text(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(render_value(&value), expected);
    }

    #[rstest]
    fn call_site_enables_report_caller() {
        let record = LogRecord::new(Level::Info, "hi").with_call_site(CallSite::new("a.rs", 7, "f"));
        assert!(record.report_caller);
        assert_eq!(record.to_string(), "info - hi");
    }
}
