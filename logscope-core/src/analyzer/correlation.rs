use chrono::Duration;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::input::LogEntry;

/// Fields checked in order; the first non-empty one is the entry's key.
const CORRELATION_KEYS: [&str; 3] = ["request_id", "req_id", "requestId"];
const ERROR_CHAIN_MAX_GAP_SECS: i64 = 300;
const REQUEST_FLOW_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationType {
    RequestFlow,
    ErrorChain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationResult {
    #[serde(rename = "type")]
    pub correlation_type: CorrelationType,
    pub events: Vec<LogEntry>,
    pub pattern_description: String,
    pub confidence: f64,
    pub impact: Impact,
}

pub fn correlation_key(entry: &LogEntry) -> Option<&str> {
    CORRELATION_KEYS.iter().find_map(|key| entry.non_empty(key))
}

/// Request flows followed by error chains, ordered by descending confidence.
pub fn find_correlations(entries: &[LogEntry]) -> Vec<CorrelationResult> {
    let mut results = request_flows(entries);
    results.extend(error_chains(entries));
    results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    debug!("Found {} correlations", results.len());
    results
}

fn request_flows(entries: &[LogEntry]) -> Vec<CorrelationResult> {
    let mut groups: IndexMap<&str, Vec<&LogEntry>> = IndexMap::new();
    for entry in entries {
        if let Some(key) = correlation_key(entry) {
            groups.entry(key).or_default().push(entry);
        }
    }

    groups
        .into_iter()
        .filter(|(_, events)| events.len() > 1)
        .filter_map(|(key, events)| {
            let failures = events.iter().filter(|e| e.is_failure()).count();
            if failures == 0 {
                return None;
            }
            Some(CorrelationResult {
                correlation_type: CorrelationType::RequestFlow,
                pattern_description: format!(
                    "Request {} spans {} events with {} failure(s)",
                    key,
                    events.len(),
                    failures
                ),
                events: events.into_iter().cloned().collect(),
                confidence: REQUEST_FLOW_CONFIDENCE,
                impact: Impact::High,
            })
        })
        .collect()
}

fn error_chains(entries: &[LogEntry]) -> Vec<CorrelationResult> {
    let max_gap = Duration::seconds(ERROR_CHAIN_MAX_GAP_SECS);
    let mut results = Vec::new();

    // An error without a timestamp ends the run it interrupts.
    let mut runs: Vec<Vec<&LogEntry>> = vec![Vec::new()];
    for entry in entries.iter().filter(|e| e.is_error()) {
        if entry.parsed_timestamp.is_some() {
            if let Some(run) = runs.last_mut() {
                run.push(entry);
            }
        } else if runs.last().map_or(false, |run| !run.is_empty()) {
            runs.push(Vec::new());
        }
    }

    for mut run in runs {
        run.sort_by_key(|e| e.parsed_timestamp);

        let mut chain: Vec<&LogEntry> = Vec::new();
        for entry in run {
            let linked = match (chain.last().and_then(|e| e.parsed_timestamp), entry.parsed_timestamp) {
                (Some(prev), Some(ts)) => ts - prev <= max_gap,
                _ => false,
            };
            if !linked {
                results.extend(close_chain(std::mem::take(&mut chain)));
            }
            chain.push(entry);
        }
        results.extend(close_chain(chain));
    }

    results
}

fn close_chain(chain: Vec<&LogEntry>) -> Option<CorrelationResult> {
    if chain.len() < 2 {
        return None;
    }
    let span = match (chain[0].parsed_timestamp, chain[chain.len() - 1].parsed_timestamp) {
        (Some(first), Some(last)) => (last - first).num_seconds(),
        _ => 0,
    };
    let length = chain.len();

    Some(CorrelationResult {
        correlation_type: CorrelationType::ErrorChain,
        events: chain.into_iter().cloned().collect(),
        pattern_description: format!("{} errors within {}s", length, span),
        confidence: (length as f64 / 5.0).min(1.0),
        impact: if length > 3 { Impact::High } else { Impact::Medium },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(line: usize, minute: u32, second: u32) -> LogEntry {
        let mut entry = LogEntry::new(line, format!("line {}", line));
        entry.parsed_timestamp = Some(Utc.with_ymd_and_hms(2023, 12, 10, 10, minute, second).unwrap());
        entry
    }

    fn error_at(line: usize, minute: u32, second: u32) -> LogEntry {
        let mut entry = at(line, minute, second);
        entry.insert("level", "error");
        entry
    }

    fn lines(result: &CorrelationResult) -> Vec<usize> {
        result.events.iter().map(|e| e.line_number).collect()
    }

    #[test]
    fn test_request_flow_requires_a_failure() {
        let mut a = LogEntry::new(1, "a");
        a.insert("request_id", "r1");
        a.insert("status", "200");
        let mut b = LogEntry::new(2, "b");
        b.insert("requestId", "r1");
        b.insert("status", "404");
        let mut c = LogEntry::new(3, "c");
        c.insert("req_id", "r2");
        c.insert("status", "200");
        let mut d = LogEntry::new(4, "d");
        d.insert("req_id", "r2");
        d.insert("status", "200");

        let results = find_correlations(&[a, b, c, d]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].correlation_type, CorrelationType::RequestFlow);
        assert_eq!(results[0].impact, Impact::High);
        assert_eq!(results[0].confidence, 0.9);
        assert_eq!(lines(&results[0]), vec![1, 2]);
    }

    #[test]
    fn test_error_chain_of_two() {
        let results = find_correlations(&[error_at(1, 0, 0), error_at(2, 0, 30)]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].correlation_type, CorrelationType::ErrorChain);
        assert!((results[0].confidence - 0.4).abs() < 1e-9);
        assert_eq!(results[0].impact, Impact::Medium);
    }

    #[test]
    fn test_error_chain_gap_is_inclusive() {
        let results = find_correlations(&[error_at(1, 0, 0), error_at(2, 5, 0), error_at(3, 10, 1)]);
        assert_eq!(results.len(), 1);
        assert_eq!(lines(&results[0]), vec![1, 2]);
    }

    #[test]
    fn test_error_chain_orders_chronologically() {
        let results = find_correlations(&[
            error_at(1, 3, 0),
            error_at(2, 1, 0),
            error_at(3, 2, 0),
            error_at(4, 4, 0),
            error_at(5, 0, 0),
        ]);
        assert_eq!(results.len(), 1);
        assert_eq!(lines(&results[0]), vec![5, 2, 3, 1, 4]);
        assert_eq!(results[0].confidence, 1.0);
        assert_eq!(results[0].impact, Impact::High);
    }

    #[test]
    fn test_untimestamped_error_breaks_chain() {
        let mut orphan = LogEntry::new(2, "orphan");
        orphan.insert("level", "error");
        let results = find_correlations(&[error_at(1, 0, 0), orphan, error_at(3, 0, 10)]);
        assert!(results.is_empty());
    }

    #[test]
    fn test_non_errors_are_ignored_for_chains() {
        let mut ok = at(2, 0, 5);
        ok.insert("status", "200");
        let mut server_error = at(3, 0, 10);
        server_error.insert("status", "503");
        let results = find_correlations(&[error_at(1, 0, 0), ok, server_error]);
        assert_eq!(results.len(), 1);
        assert_eq!(lines(&results[0]), vec![1, 3]);
    }

    #[test]
    fn test_ordered_by_confidence() {
        let mut entries = Vec::new();
        for i in 0..3 {
            let mut e = error_at(i + 1, 0, i as u32);
            e.insert("request_id", "shared");
            entries.push(e);
        }
        let results = find_correlations(&entries);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].correlation_type, CorrelationType::RequestFlow);
        assert!((results[1].confidence - 0.6).abs() < 1e-9);
    }
}
