//! `key=value` line formatter.

use super::{FieldMap, FormatError, TimestampFormat, WireFormatter};
use crate::{log_record::render_value, normalizer::NormalizedRecord};

/// Writes `time="…" level=… msg="…" k=v …` lines.
#[derive(Clone, Debug, Default)]
pub struct TextFormatter {
    pub field_map: FieldMap,
    pub timestamp_format: TimestampFormat,
}

impl TextFormatter {
    pub fn with_field_map(mut self, field_map: FieldMap) -> Self {
        self.field_map = field_map;
        self
    }

    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }
}

fn needs_quoting(text: &str) -> bool {
    !text.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '/' | '@' | '^' | '+')
    })
}

fn push_pair(line: &mut String, key: &str, value: &str) -> Result<(), FormatError> {
    if !line.is_empty() {
        line.push(' ');
    }
    line.push_str(key);
    line.push('=');
    if needs_quoting(value) {
        line.push_str(&serde_json::to_string(value)?);
    } else {
        line.push_str(value);
    }
    Ok(())
}

impl WireFormatter for TextFormatter {
    fn format(&self, record: &NormalizedRecord) -> Result<Vec<u8>, FormatError> {
        let mut line = String::with_capacity(128);
        let timestamp = self.timestamp_format.render(&record.timestamp)?;
        push_pair(&mut line, &self.field_map.time, &timestamp)?;
        push_pair(&mut line, &self.field_map.level, record.level.as_str())?;
        push_pair(&mut line, &self.field_map.message, &record.message)?;
        for (key, value) in &record.data {
            push_pair(&mut line, &self.field_map.resolve_key(key), &render_value(value))?;
        }
        line.push('\n');
        Ok(line.into_bytes())
    }
}
