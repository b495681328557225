use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::format::{definition, FormatId};
use crate::input::LogEntry;
use crate::timestamp::TimestampNormalizer;

const SNIPPET_CHARS: usize = 100;

/// Vendor spellings folded onto the names the analyzers look for.
const JSON_ALIASES: [(&str, &str); 6] = [
    ("time", "timestamp"),
    ("msg", "message"),
    ("reqId", "request_id"),
    ("userId", "user_id"),
    ("responseTime", "duration"),
    ("statusCode", "status"),
];

#[derive(Debug, Clone)]
enum LineMode {
    Pattern { regex: Regex, fields: Vec<String> },
    Json,
    /// The caller's pattern did not compile; every line reports it.
    InvalidPattern(String),
}

#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub entries: Vec<LogEntry>,
    /// Messages of the form `Line N: ...`, one per failed line.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LineParser {
    format: FormatId,
    mode: LineMode,
    normalizer: TimestampNormalizer,
}

impl LineParser {
    /// Resolves the configured format. Unknown formats and a custom format
    /// without pattern or fields are caller errors; a custom pattern that
    /// fails to compile is not.
    pub fn from_config(config: &AnalysisConfig, normalizer: TimestampNormalizer) -> Result<Self> {
        let format: FormatId = config
            .format
            .parse()
            .map_err(|format| AnalysisError::UnsupportedFormat { format })?;

        let mode = match format {
            FormatId::Json => LineMode::Json,
            FormatId::Custom => {
                let (pattern, fields) = match (&config.custom_pattern, &config.fields) {
                    (Some(p), Some(f)) if !p.is_empty() && !f.is_empty() => (p, f),
                    _ => return Err(AnalysisError::MissingCustomPattern),
                };
                match Regex::new(pattern) {
                    Ok(regex) => LineMode::Pattern {
                        regex,
                        fields: fields.clone(),
                    },
                    Err(e) => {
                        warn!("Custom pattern failed to compile: {}", e);
                        LineMode::InvalidPattern(e.to_string())
                    }
                }
            }
            builtin => {
                let def = definition(builtin);
                let regex = def
                    .pattern
                    .clone()
                    .ok_or_else(|| AnalysisError::Internal(format!("{} has no pattern", builtin)))?;
                LineMode::Pattern {
                    regex,
                    fields: def.fields.iter().map(|f| f.to_string()).collect(),
                }
            }
        };

        debug!("Resolved log format {}", format);
        Ok(Self {
            format,
            mode,
            normalizer,
        })
    }

    pub fn format(&self) -> FormatId {
        self.format
    }

    pub fn parse_line(&self, line_number: usize, line: &str) -> std::result::Result<LogEntry, String> {
        let mut entry = match &self.mode {
            LineMode::Pattern { regex, fields } => {
                let caps = regex.captures(line).ok_or_else(|| {
                    format!("Line {}: Does not match {} format: {}", line_number, self.format, snippet(line))
                })?;
                let mut entry = LogEntry::new(line_number, line);
                for (i, field) in fields.iter().enumerate() {
                    if let Some(m) = caps.get(i + 1) {
                        entry.insert(field.as_str(), m.as_str());
                    }
                }
                entry
            }
            LineMode::Json => parse_json_line(line_number, line)?,
            LineMode::InvalidPattern(reason) => {
                return Err(format!("Line {}: Invalid custom pattern: {}", line_number, reason));
            }
        };

        entry.parsed_timestamp = entry
            .non_empty("timestamp")
            .and_then(|raw| self.normalizer.normalize(raw));
        Ok(entry)
    }

    pub fn parse_lines<'a>(&self, lines: impl IntoIterator<Item = (usize, &'a str)>) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();
        for (line_number, line) in lines {
            match self.parse_line(line_number, line) {
                Ok(entry) => outcome.entries.push(entry),
                Err(message) => outcome.errors.push(message),
            }
        }
        debug!(
            "Parsed {} lines, {} failed",
            outcome.entries.len(),
            outcome.errors.len()
        );
        outcome
    }
}

fn parse_json_line(line_number: usize, line: &str) -> std::result::Result<LogEntry, String> {
    let value: Value = serde_json::from_str(line.trim())
        .map_err(|e| format!("Line {}: Invalid JSON ({}): {}", line_number, e, snippet(line)))?;

    let Value::Object(object) = value else {
        return Err(format!("Line {}: Expected a JSON object: {}", line_number, snippet(line)));
    };

    let mut entry = LogEntry::new(line_number, line);
    for (key, value) in &object {
        let name = JSON_ALIASES
            .iter()
            .find(|(alias, canonical)| alias == key && !object.contains_key(*canonical))
            .map_or(key.as_str(), |(_, canonical)| *canonical);

        let text = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        entry.insert(name, text);
    }
    Ok(entry)
}

fn snippet(line: &str) -> String {
    line.chars().take(SNIPPET_CHARS).collect()
}
