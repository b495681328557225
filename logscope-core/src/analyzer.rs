//! Analysis pipeline
//!
//! Runs one batch through parse, filter, statistics, anomaly detection,
//! correlation and temporal analysis, in that order, and assembles the
//! bounded report.

pub mod anomaly;
pub mod correlation;
pub mod stats;
pub mod temporal;

use indexmap::IndexSet;
use tracing::{debug, info};

use crate::error::Result;
use crate::filter::apply_filters;
use crate::format::definition;
use crate::input::AnalysisRequest;
use crate::output::{
    AnalysisReport, ReportConfig, Summary, MAX_ANOMALIES, MAX_CORRELATIONS, MAX_ENTRIES, MAX_ERRORS,
};
use crate::parser::LineParser;
use crate::timestamp::TimestampNormalizer;

use anomaly::AnomalyDetector;
use correlation::find_correlations;
use stats::compute_field_stats;
use temporal::analyze_time;

#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    normalizer: TimestampNormalizer,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the year assumed for syslog timestamps.
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.normalizer = TimestampNormalizer::with_reference_year(year);
        self
    }

    /// Parses raw text or an envelope, then analyzes it.
    pub fn analyze_input(&self, input: &str) -> Result<AnalysisReport> {
        let request = AnalysisRequest::from_input(input)?;
        self.analyze(&request)
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport> {
        let config = &request.config;
        let parser = LineParser::from_config(config, self.normalizer.clone())?;
        let format = parser.format();

        let batch = request.batch();
        let total_lines = batch.len();
        info!("Analyzing {} lines as {}", total_lines, format);

        let outcome = parser.parse_lines(batch);
        let parsed_lines = outcome.entries.len();
        let fields: IndexSet<String> = outcome
            .entries
            .iter()
            .flat_map(|e| e.fields.keys().cloned())
            .collect();

        let entries = apply_filters(outcome.entries, &config.filters);
        debug!("{} of {} entries passed filters", entries.len(), parsed_lines);

        let field_stats = compute_field_stats(&entries);
        let mut anomalies = AnomalyDetector::new(definition(format), config.anomaly_config()).detect(&entries);
        let mut correlations = find_correlations(&entries);
        let time_analysis = analyze_time(&entries);

        let summary = Summary {
            total_lines,
            parsed_lines,
            filtered_lines: entries.len(),
            error_lines: outcome.errors.len(),
            format,
            fields: fields.into_iter().collect(),
            anomalies_detected: anomalies.len(),
            correlations_found: correlations.len(),
        };
        info!(
            "Analysis complete: {} parsed, {} anomalies, {} correlations",
            summary.parsed_lines, summary.anomalies_detected, summary.correlations_found
        );

        anomalies.truncate(MAX_ANOMALIES);
        correlations.truncate(MAX_CORRELATIONS);
        let mut errors = outcome.errors;
        errors.truncate(MAX_ERRORS);

        Ok(AnalysisReport {
            summary,
            field_stats,
            time_analysis,
            anomalies,
            correlations,
            entries: entries.into_iter().take(MAX_ENTRIES).collect(),
            errors,
            config: ReportConfig {
                format,
                filters: config.filters.clone(),
                max_lines: config.max_lines,
                custom_pattern: config.custom_pattern.clone(),
                anomaly_detection: config.anomaly_detection,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::error::AnalysisError;
    use crate::format::FormatId;

    const NGINX_LINE: &str =
        r#"192.168.1.1 - - [10/Dec/2023:10:15:32 +0000] "GET /api/users HTTP/1.1" 200 1234 "-" "curl/8.0""#;

    #[test]
    fn test_counts_and_caps() {
        let mut logs: Vec<String> = (0..60).map(|_| NGINX_LINE.to_string()).collect();
        for i in 0..15 {
            logs.push(format!("garbage {}", i));
        }
        let request = AnalysisRequest::new(
            logs.join("\n"),
            AnalysisConfig {
                max_lines: 1000,
                anomaly_detection: false,
                ..AnalysisConfig::default()
            },
        );
        let report = Analyzer::new().analyze(&request).unwrap();

        assert_eq!(report.summary.total_lines, 75);
        assert_eq!(report.summary.parsed_lines, 60);
        assert_eq!(report.summary.filtered_lines, 60);
        assert_eq!(report.summary.error_lines, 15);
        assert_eq!(report.summary.format, FormatId::Nginx);
        assert_eq!(report.summary.fields.len(), 10);
        assert_eq!(report.entries.len(), MAX_ENTRIES);
        assert_eq!(report.errors.len(), MAX_ERRORS);
        assert!(report.errors[0].starts_with("Line 61: "));
        assert!(report.anomalies.is_empty());
    }

    #[test]
    fn test_max_lines_bounds_the_batch() {
        let logs: Vec<&str> = (0..150).map(|_| NGINX_LINE).collect();
        let report = Analyzer::new()
            .analyze(&AnalysisRequest::new(logs.join("\n"), AnalysisConfig::default()))
            .unwrap();
        assert_eq!(report.summary.total_lines, 100);
        assert_eq!(report.config.max_lines, 100);
    }

    #[test]
    fn test_unknown_format_is_a_caller_error() {
        let request = AnalysisRequest::new(
            NGINX_LINE,
            AnalysisConfig {
                format: "xml".to_string(),
                ..AnalysisConfig::default()
            },
        );
        assert!(matches!(
            Analyzer::new().analyze(&request),
            Err(AnalysisError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_empty_input() {
        let report = Analyzer::new().analyze_input("").unwrap();
        assert_eq!(report.summary.total_lines, 0);
        assert!(report.time_analysis.is_none());
        assert!(report.field_stats.is_empty());
    }
}
