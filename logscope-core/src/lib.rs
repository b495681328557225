// Logscope - log analysis engine
//
// Parses log text in several formats into structured entries and reports
// field statistics, anomalies, correlated events and traffic shape. Shared by
// the CLI and the browser toolbox.

use std::panic::{self, AssertUnwindSafe};

use serde_json::{json, Value};
use tracing::error;

pub mod analyzer;
pub mod config;
pub mod error;
pub mod filter;
pub mod format;
pub mod input;
pub mod output;
pub mod parser;
pub mod timestamp;

pub use analyzer::anomaly::{AnomalyDetector, AnomalyResult, AnomalyType, Severity};
pub use analyzer::correlation::{find_correlations, CorrelationResult, CorrelationType, Impact};
pub use analyzer::stats::{compute_field_stats, FieldStatResult, NumericSummary};
pub use analyzer::temporal::{analyze_time, TimeAnalysis};
pub use analyzer::Analyzer;
pub use config::{AnalysisConfig, AnomalyConfig, Sensitivity};
pub use error::AnalysisError;
pub use filter::{apply_filters, FilterChain, FilterOperator, FilterPredicate};
pub use format::{log_formats, AnomalyFieldConfig, FormatDefinition, FormatId, FormatInfo};
pub use input::{AnalysisRequest, LogEntry};
pub use output::{error_value, AnalysisReport};
pub use parser::LineParser;
pub use timestamp::TimestampNormalizer;

/// Runs the full pipeline on raw log text or a `{logs, config}` envelope.
///
/// Never fails: every error, including a panic inside the pipeline, comes
/// back as an `{error: ...}` document.
pub fn process_input(input: &str) -> Value {
    process_with(&Analyzer::new(), input)
}

pub fn process_with(analyzer: &Analyzer, input: &str) -> Value {
    guarded(|| analyzer.analyze_input(input))
}

/// Like [`process_with`] for a request whose configuration is already built.
pub fn process_request(analyzer: &Analyzer, request: &AnalysisRequest) -> Value {
    guarded(|| analyzer.analyze(request))
}

fn guarded(run: impl FnOnce() -> error::Result<AnalysisReport>) -> Value {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run().and_then(|report| report.to_value())));

    match outcome {
        Ok(Ok(report)) => report,
        Ok(Err(e)) => {
            error!("Analysis failed: {}", e);
            error_value(&e)
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unexpected failure".to_string());
            error!("Analysis panicked: {}", message);
            error_value(&AnalysisError::Internal(message))
        }
    }
}

/// Asynchronous entry point shared with the other toolbox tools. Nothing is
/// awaited; the pipeline runs to completion on the calling task.
pub async fn analyze_logs(input: &str) -> Value {
    process_input(input)
}

/// Catalog used by format pickers.
pub fn get_log_formats() -> Value {
    json!({ "formats": log_formats() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_input_reports_config_errors_as_json() {
        let value = process_input(r#"{"logs":"x","config":{"format":"xml"}}"#);
        assert_eq!(value["error"], "Unsupported format: xml");
        assert!(value["supportedFormats"].is_array());

        let value = process_input(r#"{"logs":"x","config":{"format":"custom"}}"#);
        assert_eq!(value["error"], "Custom format requires both customPattern and fields");
    }

    #[test]
    fn test_panics_become_processing_errors() {
        let value = guarded(|| panic!("boom"));
        assert_eq!(value, json!({ "error": "Processing error: boom" }));

        let stage = "stats";
        let value = guarded(|| panic!("{} stage failed", stage));
        assert_eq!(value, json!({ "error": "Processing error: stats stage failed" }));
    }

    #[test]
    fn test_format_catalog() {
        let value = get_log_formats();
        let formats = value["formats"].as_array().unwrap();
        assert_eq!(formats.len(), 5);
        assert_eq!(formats[0]["id"], "nginx");
        assert_eq!(formats[0]["hasAnomalyDetection"], true);
    }
}
