//! Reshape raw records into the Logstash wire schema.
//!
//! Ad-hoc attributes are flattened into one space-separated `fields`
//! attribute so downstream indexes see a stable set of keys. Call-site
//! details are promoted to dedicated `file` and `function` attributes and
//! hook defaults fill whatever the record left unset.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    level::Level,
    log_record::{Fields, LogRecord, render_value},
};

/// Attribute holding the flattened `key=value` text.
pub const FIELDS_KEY: &str = "fields";
/// Promoted call-site file (`"<file>:<line>"`).
pub const FILE_KEY: &str = "file";
/// Promoted call-site function.
pub const FUNCTION_KEY: &str = "function";

/// Baseline Logstash attributes applied by [`logstash_defaults`].
pub const BASELINE_DEFAULTS: [(&str, &str); 2] = [("@version", "1"), ("type", "log")];

/// Return a copy of `fields` with the baseline Logstash attributes added
/// wherever the caller did not supply a value.
pub fn logstash_defaults(fields: &Fields) -> Fields {
    let mut merged = fields.clone();
    for (key, value) in BASELINE_DEFAULTS {
        merged
            .entry(key.to_owned())
            .or_insert_with(|| Value::String(value.to_owned()));
    }
    merged
}

/// A record in wire-schema shape, ready for a [`WireFormatter`](crate::formatter::WireFormatter).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedRecord {
    pub message: String,
    pub level: Level,
    pub timestamp: DateTime<Utc>,
    /// Promoted attributes, the synthetic `fields` entry, and defaults.
    pub data: Fields,
}

impl NormalizedRecord {
    /// Flattened attribute text, if the record carried any attributes.
    pub fn fields_text(&self) -> Option<&str> {
        self.data.get(FIELDS_KEY).and_then(Value::as_str)
    }
}

/// Build a fresh normalized record from `raw`.
pub fn normalize(raw: &LogRecord, defaults: &Fields) -> NormalizedRecord {
    let mut out = NormalizedRecord::default();
    normalize_into(raw, defaults, &mut out);
    out
}

/// Overwrite `out` with the normalized form of `raw`.
///
/// `out` keeps its allocations between calls, which lets a long-lived
/// dispatcher reuse one scratch record. The raw attribute map is only read.
pub fn normalize_into(raw: &LogRecord, defaults: &Fields, out: &mut NormalizedRecord) {
    out.message.clear();
    out.message.push_str(&raw.message);
    out.level = raw.level;
    out.timestamp = raw.timestamp;
    out.data.clear();

    if raw.report_caller {
        promote_call_site(raw, &mut out.data);
    }

    let mut text = String::new();
    for (key, value) in &raw.fields {
        // Only keys that were promoted above are kept out of `fields`.
        if raw.report_caller && is_call_site_key(key) && out.data.contains_key(key) {
            continue;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(key);
        text.push('=');
        text.push_str(&render_value(value));
    }
    if !text.is_empty() {
        out.data.insert(FIELDS_KEY.to_owned(), Value::String(text));
    }

    for (key, value) in defaults {
        if !out.data.contains_key(key) {
            out.data.insert(key.clone(), value.clone());
        }
    }
}

fn is_call_site_key(key: &str) -> bool {
    key == FILE_KEY || key == FUNCTION_KEY
}

fn promote_call_site(raw: &LogRecord, data: &mut Fields) {
    match &raw.call_site {
        Some(site) => {
            data.insert(
                FUNCTION_KEY.to_owned(),
                Value::String(site.function.clone()),
            );
            data.insert(
                FILE_KEY.to_owned(),
                Value::String(format!("{}:{}", site.file, site.line)),
            );
        }
        None => {
            for key in [FILE_KEY, FUNCTION_KEY] {
                if let Some(value) = raw.fields.get(key)
                    && !value.is_null()
                {
                    data.insert(key.to_owned(), value.clone());
                }
            }
        }
    }
}
