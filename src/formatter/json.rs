//! JSON line formatter.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::{FormatError, WireFormatter};
use crate::normalizer::NormalizedRecord;

/// Output key names for the fixed record attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldMap {
    pub time: String,
    pub message: String,
    pub level: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            time: "time".into(),
            message: "msg".into(),
            level: "level".into(),
        }
    }
}

impl FieldMap {
    /// Key names Logstash expects: `@timestamp`, `message`, `level`.
    pub fn logstash() -> Self {
        Self {
            time: "@timestamp".into(),
            message: "message".into(),
            level: "level".into(),
        }
    }

    fn is_reserved(&self, key: &str) -> bool {
        key == self.time || key == self.message || key == self.level
    }

    /// Move data keys that would shadow a reserved key under `fields.`.
    pub(crate) fn resolve_key<'a>(&self, key: &'a str) -> std::borrow::Cow<'a, str> {
        if self.is_reserved(key) {
            format!("fields.{key}").into()
        } else {
            key.into()
        }
    }
}

/// How timestamps are rendered.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TimestampFormat {
    /// RFC 3339 with whole seconds.
    Rfc3339,
    /// RFC 3339 with as many fractional digits as needed.
    #[default]
    Rfc3339Nano,
    /// A `chrono` strftime pattern, e.g. `"%-I:%M%p"`.
    Custom(String),
}

impl TimestampFormat {
    pub fn render(&self, timestamp: &DateTime<Utc>) -> Result<String, FormatError> {
        match self {
            TimestampFormat::Rfc3339 => Ok(timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)),
            TimestampFormat::Rfc3339Nano => {
                Ok(timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            TimestampFormat::Custom(pattern) => {
                let mut out = String::new();
                write!(out, "{}", timestamp.format(pattern)).map_err(|_| {
                    FormatError::Message(format!("invalid timestamp pattern: {pattern}"))
                })?;
                Ok(out)
            }
        }
    }
}

/// Encodes each record as one JSON object followed by a newline.
///
/// Keys are emitted in sorted order so identical records always produce
/// identical bytes.
#[derive(Clone, Debug, Default)]
pub struct JsonFormatter {
    pub field_map: FieldMap,
    pub timestamp_format: TimestampFormat,
}

impl JsonFormatter {
    /// Formatter used by [`LogstashFormatter::logstash`](super::LogstashFormatter::logstash).
    pub fn logstash() -> Self {
        Self {
            field_map: FieldMap::logstash(),
            timestamp_format: TimestampFormat::Rfc3339Nano,
        }
    }

    pub fn with_field_map(mut self, field_map: FieldMap) -> Self {
        self.field_map = field_map;
        self
    }

    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }
}

impl WireFormatter for JsonFormatter {
    fn format(&self, record: &NormalizedRecord) -> Result<Vec<u8>, FormatError> {
        let mut object = Map::new();
        for (key, value) in &record.data {
            object.insert(self.field_map.resolve_key(key).into_owned(), value.clone());
        }
        object.insert(
            self.field_map.time.clone(),
            Value::String(self.timestamp_format.render(&record.timestamp)?),
        );
        object.insert(
            self.field_map.message.clone(),
            Value::String(record.message.clone()),
        );
        object.insert(
            self.field_map.level.clone(),
            Value::String(record.level.as_str().to_owned()),
        );

        let mut bytes = serde_json::to_vec(&object)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        level::Level,
        log_record::{Fields, LogRecord},
        normalizer::{logstash_defaults, normalize},
    };
    use chrono::TimeZone;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 15, 4, 5).single().expect("valid time")
    }

    fn decode(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).expect("valid json")
    }

    #[rstest]
    fn writes_sorted_object_with_custom_timestamp(timestamp: DateTime<Utc>) {
        let mut defaults = Fields::new();
        defaults.insert("HOSTNAME".into(), json!("localhost"));
        defaults.insert("USERNAME".into(), json!("root"));
        let raw = LogRecord::new(Level::Error, "this is an error message!").with_timestamp(timestamp);
        let formatter = JsonFormatter::default()
            .with_field_map(FieldMap::logstash())
            .with_timestamp_format(TimestampFormat::Custom("%-I:%M%p".into()));

        let bytes = formatter.format(&normalize(&raw, &defaults)).expect("format");
        let expected = concat!(
            r#"{"@timestamp":"3:04PM","HOSTNAME":"localhost","USERNAME":"root","#,
            r#""level":"error","message":"this is an error message!"}"#,
            "\n"
        );
        assert_eq!(String::from_utf8(bytes).expect("utf8"), expected);
    }

    #[rstest]
    fn logstash_layout_contains_schema_fields(timestamp: DateTime<Utc>) {
        let raw = LogRecord::new(Level::Debug, "message bla bla")
            .with_timestamp(timestamp)
            .with_field("Key1", "Value1");
        let record = normalize(&raw, &logstash_defaults(&Fields::new()));
        let value = decode(&JsonFormatter::logstash().format(&record).expect("format"));
        assert_eq!(value["message"], "message bla bla");
        assert_eq!(value["level"], "debug");
        assert_eq!(value["fields"], "Key1=Value1");
        assert_eq!(value["@version"], "1");
        assert_eq!(value["type"], "log");
        assert_eq!(value["@timestamp"], "2024-03-09T15:04:05Z");
    }

    #[rstest]
    fn reserved_keys_in_data_are_prefixed(timestamp: DateTime<Utc>) {
        let mut defaults = Fields::new();
        defaults.insert("msg".into(), json!("clash"));
        let raw = LogRecord::new(Level::Info, "real").with_timestamp(timestamp);
        let value = decode(
            &JsonFormatter::default()
                .format(&normalize(&raw, &defaults))
                .expect("format"),
        );
        assert_eq!(value["msg"], "real");
        assert_eq!(value["fields.msg"], "clash");
    }

    #[rstest]
    fn formatting_twice_is_byte_identical(timestamp: DateTime<Utc>) {
        let raw = LogRecord::new(Level::Info, "same")
            .with_timestamp(timestamp)
            .with_field("a", 1)
            .with_field("b", "two");
        let record = normalize(&raw, &logstash_defaults(&Fields::new()));
        let formatter = JsonFormatter::logstash();
        let first = formatter.format(&record).expect("format");
        let second = formatter.format(&record).expect("format");
        assert_eq!(first, second);
    }

    #[rstest]
    #[case(TimestampFormat::Rfc3339, "2024-03-09T15:04:05Z")]
    #[case(TimestampFormat::Custom("%Y/%m/%d".into()), "2024/03/09")]
    fn renders_timestamps(
        timestamp: DateTime<Utc>,
        #[case] format: TimestampFormat,
        #[case] expected: &str,
    ) {
        assert_eq!(format.render(&timestamp).expect("render"), expected);
    }

    #[rstest]
    fn invalid_pattern_is_a_format_error(timestamp: DateTime<Utc>) {
        let err = TimestampFormat::Custom("%Y-%".into())
            .render(&timestamp)
            .expect_err("pattern must be rejected");
        assert!(matches!(err, FormatError::Message(msg) if msg.contains("%Y-%")));
    }
}
