use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};

use crate::analyzer::anomaly::AnomalyResult;
use crate::analyzer::correlation::CorrelationResult;
use crate::analyzer::stats::FieldStatResult;
use crate::analyzer::temporal::TimeAnalysis;
use crate::error::{AnalysisError, Result};
use crate::filter::FilterPredicate;
use crate::format::FormatId;
use crate::input::LogEntry;

pub const MAX_ANOMALIES: usize = 20;
pub const MAX_CORRELATIONS: usize = 10;
pub const MAX_ENTRIES: usize = 50;
pub const MAX_ERRORS: usize = 10;

/// The JSON document one analysis run produces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub summary: Summary,
    pub field_stats: IndexMap<String, FieldStatResult>,
    pub time_analysis: Option<TimeAnalysis>,
    pub anomalies: Vec<AnomalyResult>,
    pub correlations: Vec<CorrelationResult>,
    pub entries: Vec<LogEntry>,
    pub errors: Vec<String>,
    pub config: ReportConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_lines: usize,
    pub parsed_lines: usize,
    pub filtered_lines: usize,
    pub error_lines: usize,
    pub format: FormatId,
    pub fields: Vec<String>,
    pub anomalies_detected: usize,
    pub correlations_found: usize,
}

/// Echo of the configuration the run actually used.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    pub format: FormatId,
    pub filters: Vec<FilterPredicate>,
    pub max_lines: usize,
    pub custom_pattern: Option<String>,
    pub anomaly_detection: bool,
}

impl AnalysisReport {
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let rendered = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(rendered)
    }
}

/// The failure document returned in place of a report.
pub fn error_value(err: &AnalysisError) -> Value {
    match err {
        AnalysisError::UnsupportedFormat { .. } => json!({
            "error": err.to_string(),
            "supportedFormats": FormatId::supported(),
        }),
        _ => json!({ "error": err.to_string() }),
    }
}
