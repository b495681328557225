use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AnalysisConfig, MAX_INPUT_BYTES};
use crate::error::{AnalysisError, Result};

/// Serialized beside the fields of every entry.
const METADATA_KEYS: [&str; 3] = ["_lineNumber", "_originalLine", "_parsedTimestamp"];

/// One successfully parsed input line.
///
/// Field order follows the format definition (or key order for JSON lines).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    #[serde(flatten)]
    pub fields: IndexMap<String, String>,
    #[serde(rename = "_lineNumber")]
    pub line_number: usize,
    #[serde(rename = "_originalLine")]
    pub original_line: String,
    #[serde(rename = "_parsedTimestamp")]
    pub parsed_timestamp: Option<DateTime<Utc>>,
}

impl LogEntry {
    pub fn new(line_number: usize, original_line: impl Into<String>) -> Self {
        Self {
            fields: IndexMap::new(),
            line_number,
            original_line: original_line.into(),
            parsed_timestamp: None,
        }
    }

    /// Stores a field. Names that collide with the metadata keys are stored
    /// with a `log` prefix (`_lineNumber` becomes `log_lineNumber`).
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let mut field = field.into();
        if METADATA_KEYS.contains(&field.as_str()) {
            field.insert_str(0, "log");
        }
        self.fields.insert(field, value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Field value, treating an empty string as absent.
    pub fn non_empty(&self, field: &str) -> Option<&str> {
        self.get(field).filter(|v| !v.trim().is_empty())
    }

    pub fn level(&self) -> Option<&str> {
        self.non_empty("level")
    }

    pub fn status(&self) -> Option<u16> {
        self.non_empty("status").and_then(|s| s.trim().parse().ok())
    }

    /// Error/fatal level, or a 5xx status.
    pub fn is_error(&self) -> bool {
        self.level().map_or(false, is_error_level) || self.status().map_or(false, |s| s >= 500)
    }

    /// Error/fatal level, or any 4xx/5xx status.
    pub fn is_failure(&self) -> bool {
        self.level().map_or(false, is_error_level) || self.status().map_or(false, |s| s >= 400)
    }
}

pub fn is_error_level(level: &str) -> bool {
    matches!(
        level.trim().to_lowercase().as_str(),
        "error" | "err" | "fatal" | "critical" | "crit" | "emerg" | "alert"
    )
}

#[derive(Debug, Deserialize)]
struct Envelope {
    logs: String,
    #[serde(default)]
    config: Option<serde_json::Value>,
}

/// Log text plus the configuration it should be analyzed with.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub logs: String,
    pub config: AnalysisConfig,
}

impl AnalysisRequest {
    pub fn new(logs: impl Into<String>, config: AnalysisConfig) -> Self {
        Self {
            logs: logs.into(),
            config,
        }
    }

    /// Accepts raw log text or a `{logs, config}` envelope. A JSON object
    /// whose `logs` is not a string is a log line, not an envelope.
    pub fn from_input(input: &str) -> Result<Self> {
        if input.len() > MAX_INPUT_BYTES {
            return Err(AnalysisError::InputTooLarge {
                size: input.len(),
                limit: MAX_INPUT_BYTES,
            });
        }

        let trimmed = input.trim();
        if trimmed.starts_with('{') {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
                if value.get("logs").map_or(false, serde_json::Value::is_string) {
                    debug!("Input is a request envelope");
                    return Self::from_envelope(value);
                }
            }
        }

        Ok(Self::new(input, AnalysisConfig::default()))
    }

    fn from_envelope(value: serde_json::Value) -> Result<Self> {
        let envelope: Envelope = serde_json::from_value(value)
            .map_err(|e| AnalysisError::InvalidConfig(e.to_string()))?;

        let config = match envelope.config {
            Some(serde_json::Value::Null) | None => AnalysisConfig::default(),
            Some(raw) => serde_json::from_value(raw)
                .map_err(|e| AnalysisError::InvalidConfig(e.to_string()))?,
        };

        Ok(Self::new(envelope.logs, config))
    }

    /// The batch for this run: the first `max_lines` physical lines, blank
    /// ones dropped, each paired with its 1-based line number.
    pub fn batch(&self) -> Vec<(usize, &str)> {
        self.logs
            .lines()
            .take(self.config.max_lines)
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| (i + 1, line))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_text_uses_defaults() {
        let request = AnalysisRequest::from_input("line one\nline two").unwrap();
        assert_eq!(request.config.format, "nginx");
        assert_eq!(request.logs, "line one\nline two");
    }

    #[test]
    fn test_envelope_is_unwrapped() {
        let input = r#"{"logs":"a\nb","config":{"format":"json","maxLines":1}}"#;
        let request = AnalysisRequest::from_input(input).unwrap();
        assert_eq!(request.logs, "a\nb");
        assert_eq!(request.config.format, "json");
        assert_eq!(request.batch(), vec![(1, "a")]);
    }

    #[test]
    fn test_single_json_log_line_is_not_an_envelope() {
        let input = r#"{"level":"info","message":"hello"}"#;
        let request = AnalysisRequest::from_input(input).unwrap();
        assert_eq!(request.logs, input);
    }

    #[test]
    fn test_object_with_non_string_logs_is_a_log_line() {
        let input = r#"{"logs":["a","b"],"level":"info"}"#;
        let request = AnalysisRequest::from_input(input).unwrap();
        assert_eq!(request.logs, input);
        assert_eq!(request.config.format, "nginx");

        let input = r#"{"logs":42}"#;
        assert_eq!(AnalysisRequest::from_input(input).unwrap().logs, input);
    }

    #[test]
    fn test_bad_envelope_config_is_a_config_error() {
        let input = r#"{"logs":"a","config":{"maxLines":"many"}}"#;
        assert!(matches!(
            AnalysisRequest::from_input(input),
            Err(AnalysisError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_batch_keeps_physical_line_numbers() {
        let request = AnalysisRequest::new("a\n\n  \nb\r\nc", AnalysisConfig::default());
        assert_eq!(request.batch(), vec![(1, "a"), (4, "b"), (5, "c")]);
    }

    #[test]
    fn test_oversized_input_is_rejected() {
        let input = "x".repeat(MAX_INPUT_BYTES + 1);
        assert!(matches!(
            AnalysisRequest::from_input(&input),
            Err(AnalysisError::InputTooLarge { .. })
        ));
    }

    #[test]
    fn test_metadata_keys_are_not_shadowed() {
        let mut entry = LogEntry::new(9, "raw");
        entry.insert("_lineNumber", "1");
        entry.insert("_originalLine", "spoofed");
        entry.insert("message", "ok");

        assert_eq!(entry.get("_lineNumber"), None);
        assert_eq!(entry.get("log_lineNumber"), Some("1"));

        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json.matches("\"_lineNumber\"").count(), 1);
        assert_eq!(json.matches("\"_originalLine\"").count(), 1);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["_lineNumber"], 9);
        assert_eq!(value["_originalLine"], "raw");
        assert_eq!(value["log_originalLine"], "spoofed");
    }

    #[test]
    fn test_entry_error_classification() {
        let mut entry = LogEntry::new(1, "x");
        entry.insert("status", "503");
        assert!(entry.is_error());
        assert!(entry.is_failure());

        let mut entry = LogEntry::new(2, "y");
        entry.insert("status", "404");
        assert!(!entry.is_error());
        assert!(entry.is_failure());

        let mut entry = LogEntry::new(3, "z");
        entry.insert("level", "FATAL");
        assert!(entry.is_error());
    }
}
