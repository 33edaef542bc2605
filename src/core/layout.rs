//! Rendering of events into text
//!
//! Sinks only see the [`Layout`] trait. Three layouts ship with the crate:
//! - `TextLayout`: human-readable line (default)
//! - `JsonLayout`: one JSON object per event
//! - `LogfmtLayout`: `key=value` pairs for log aggregation tools

use super::log_context::FieldValue;
use super::log_event::LogEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub trait Layout: Send + Sync {
    /// One rendered event, without a trailing newline.
    fn format(&self, event: &LogEvent) -> String;

    /// Written once when a file-backed sink opens its target.
    fn header(&self) -> Option<String> {
        None
    }

    /// Written once before a file-backed sink closes its target.
    fn footer(&self) -> Option<String> {
        None
    }

    fn content_type(&self) -> &str {
        "text/plain"
    }
}

/// How timestamps are rendered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,
    /// `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,
    /// `2025-01-08T10:30:45.123+00:00`
    Rfc3339,
    /// Milliseconds since the epoch
    UnixMillis,
    /// Any strftime pattern
    Custom(String),
}

impl TimestampFormat {
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::Iso8601Micros => datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            TimestampFormat::Rfc3339 => {
                datetime.to_rfc3339_opts(chrono::SecondsFormat::Millis, false)
            }
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(pattern) => datetime.format(pattern).to_string(),
        }
    }

    fn to_json(&self, datetime: &DateTime<Utc>) -> serde_json::Value {
        match self {
            TimestampFormat::UnixMillis => datetime.timestamp_millis().into(),
            _ => serde_json::Value::String(self.format(datetime)),
        }
    }
}

/// `[timestamp] [LEVEL] thread logger - message` followed by diagnostic
/// context, structured fields and error lines
#[derive(Debug, Clone)]
pub struct TextLayout {
    pub timestamp_format: TimestampFormat,
    pub show_thread: bool,
    pub show_logger: bool,
    pub show_location: bool,
    pub header: Option<String>,
    pub footer: Option<String>,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            timestamp_format: TimestampFormat::Iso8601,
            show_thread: true,
            show_logger: true,
            show_location: false,
            header: None,
            footer: None,
        }
    }
}

impl TextLayout {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    #[must_use]
    pub fn with_thread(mut self, show: bool) -> Self {
        self.show_thread = show;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, show: bool) -> Self {
        self.show_logger = show;
        self
    }

    #[must_use]
    pub fn with_location(mut self, show: bool) -> Self {
        self.show_location = show;
        self
    }

    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    #[must_use]
    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }
}

impl Layout for TextLayout {
    fn format(&self, event: &LogEvent) -> String {
        let mut out = format!(
            "[{}] [{:5}]",
            self.timestamp_format.format(&event.timestamp),
            event.level.to_str()
        );
        if self.show_thread {
            out.push(' ');
            out.push_str(event.thread_label());
        }
        if self.show_logger {
            out.push(' ');
            out.push_str(&event.logger_name);
        }
        if self.show_location {
            if let (Some(file), Some(line)) = (&event.file, event.line) {
                out.push_str(&format!(" ({}:{})", file, line));
            }
        }
        out.push_str(" - ");
        out.push_str(&event.message);

        if let Some(ndc) = &event.ndc {
            out.push_str(&format!(" [{}]", ndc));
        }
        if let Some(mdc) = &event.mdc {
            let pairs: Vec<String> = mdc.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            out.push_str(&format!(" {{{}}}", pairs.join(", ")));
        }
        if let Some(context) = &event.context {
            if !context.is_empty() {
                out.push(' ');
                out.push_str(&context.format_fields());
            }
        }
        if let Some(error) = &event.error {
            for line in &error.lines {
                out.push_str("\n\t");
                out.push_str(line);
            }
        }
        out
    }

    fn header(&self) -> Option<String> {
        self.header.clone()
    }

    fn footer(&self) -> Option<String> {
        self.footer.clone()
    }
}

/// One flat JSON object per event
#[derive(Debug, Clone, Default)]
pub struct JsonLayout {
    pub timestamp_format: TimestampFormat,
}

impl JsonLayout {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    fn to_value(&self, event: &LogEvent) -> serde_json::Value {
        use serde_json::Value;

        let mut obj = serde_json::Map::new();
        obj.insert("timestamp".into(), self.timestamp_format.to_json(&event.timestamp));
        obj.insert("sequence".into(), event.sequence.into());
        obj.insert("level".into(), Value::String(event.level.to_str().into()));
        obj.insert("logger".into(), Value::String(event.logger_name.clone()));
        obj.insert("message".into(), Value::String(event.message.clone()));
        obj.insert("thread".into(), Value::String(event.thread_label().into()));

        if let Some(ndc) = &event.ndc {
            obj.insert("ndc".into(), Value::String(ndc.clone()));
        }
        if let Some(mdc) = &event.mdc {
            let map = mdc
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            obj.insert("mdc".into(), Value::Object(map));
        }
        if !event.properties.is_empty() {
            let map = event
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            obj.insert("properties".into(), Value::Object(map));
        }
        if let Some(file) = &event.file {
            obj.insert("file".into(), Value::String(file.clone()));
        }
        if let Some(line) = event.line {
            obj.insert("line".into(), line.into());
        }
        if let Some(error) = &event.error {
            obj.insert(
                "error".into(),
                Value::Array(error.lines.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(context) = &event.context {
            for (key, value) in context.fields() {
                obj.insert(key.clone(), value.to_json_value());
            }
        }
        Value::Object(obj)
    }
}

impl Layout for JsonLayout {
    fn format(&self, event: &LogEvent) -> String {
        self.to_value(event).to_string()
    }

    fn content_type(&self) -> &str {
        "application/json"
    }
}

/// `key=value` pairs, values quoted when needed
#[derive(Debug, Clone, Default)]
pub struct LogfmtLayout {
    pub timestamp_format: TimestampFormat,
}

impl LogfmtLayout {
    pub fn new() -> Self {
        Self::default()
    }

    fn escape_key(key: &str) -> String {
        key.chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || *c == '.')
            .collect()
    }

    fn escape_value(value: &str) -> String {
        if value.is_empty() || value.contains([' ', '"', '=']) {
            Self::quote(value)
        } else {
            value.to_string()
        }
    }

    fn quote(value: &str) -> String {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

impl Layout for LogfmtLayout {
    fn format(&self, event: &LogEvent) -> String {
        let mut parts = vec![
            format!(
                "timestamp={}",
                Self::escape_value(&self.timestamp_format.format(&event.timestamp))
            ),
            format!("level={}", event.level.to_str()),
            format!("logger={}", Self::escape_value(&event.logger_name)),
            format!("message={}", Self::quote(&event.message)),
            format!("thread={}", Self::escape_value(event.thread_label())),
        ];

        if let Some(ndc) = &event.ndc {
            parts.push(format!("ndc={}", Self::quote(ndc)));
        }
        if let Some(mdc) = &event.mdc {
            for (k, v) in mdc {
                parts.push(format!("mdc.{}={}", Self::escape_key(k), Self::escape_value(v)));
            }
        }
        if let Some(context) = &event.context {
            let mut fields: Vec<_> = context.fields().iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in fields {
                let rendered = match value {
                    FieldValue::String(s) => Self::quote(s),
                    other => other.to_string(),
                };
                parts.push(format!("{}={}", Self::escape_key(key), rendered));
            }
        }
        if let Some(error) = &event.error {
            parts.push(format!("error={}", Self::quote(&error.lines.join("; "))));
        }

        parts.join(" ")
    }
}
