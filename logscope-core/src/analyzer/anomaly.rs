use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::stats::{mean_std_dev, percentile, sorted_ascending};
use crate::config::AnomalyConfig;
use crate::filter::parse_number;
use crate::format::{AnomalyFieldConfig, DurationUnit, FormatDefinition};
use crate::input::LogEntry;

const ERROR_RATE_THRESHOLD_PCT: f64 = 5.0;
const ERROR_LOG_THRESHOLD_PCT: f64 = 10.0;
const IP_CONCENTRATION_THRESHOLD_PCT: f64 = 30.0;
const IP_CONCENTRATION_MIN_SAMPLES: usize = 10;
const SLOW_RESPONSE_P95_FACTOR: f64 = 2.0;
const SPIKE_SIGMA: f64 = 2.0;
const SPIKE_CRITICAL_SIGMA: f64 = 3.0;
const MIN_SPIKE_BUCKETS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    HighErrorRate,
    HighErrorLogs,
    SlowResponse,
    HighTrafficIp,
    TrafficSpike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyResult {
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub field: String,
    pub observed_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<String>,
    pub confidence: f64,
    pub description: String,
    pub line_number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl AnomalyResult {
    fn at(entry: &LogEntry, anomaly_type: AnomalyType, severity: Severity, field: &str) -> Self {
        Self {
            anomaly_type,
            severity,
            field: field.to_string(),
            observed_value: String::new(),
            expected_value: None,
            confidence: 0.0,
            description: String::new(),
            line_number: entry.line_number,
            timestamp: entry.parsed_timestamp,
        }
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    part as f64 * 100.0 / total as f64
}

/// Applies a format's per-field rules plus the time-bucket spike check.
pub struct AnomalyDetector<'a> {
    format: &'a FormatDefinition,
    config: AnomalyConfig,
}

impl<'a> AnomalyDetector<'a> {
    pub fn new(format: &'a FormatDefinition, config: AnomalyConfig) -> Self {
        Self { format, config }
    }

    fn factor(&self) -> f64 {
        self.config.sensitivity.threshold_factor()
    }

    /// Results ordered by descending confidence.
    pub fn detect(&self, entries: &[LogEntry]) -> Vec<AnomalyResult> {
        if !self.config.enabled || entries.len() < self.config.min_samples {
            debug!(
                "Anomaly detection skipped (enabled: {}, samples: {}, min: {})",
                self.config.enabled,
                entries.len(),
                self.config.min_samples
            );
            return Vec::new();
        }

        let mut anomalies = Vec::new();
        for (field, rule) in &self.format.anomaly_fields {
            match rule {
                AnomalyFieldConfig::HttpStatus { critical_codes } => {
                    self.http_status(field, critical_codes, entries, &mut anomalies)
                }
                AnomalyFieldConfig::LogLevel { critical_levels } => {
                    self.log_level(field, critical_levels, entries, &mut anomalies)
                }
                AnomalyFieldConfig::Duration { unit, .. } => {
                    self.duration(field, *unit, entries, &mut anomalies)
                }
                AnomalyFieldConfig::IpAddress => self.ip_address(field, entries, &mut anomalies),
                AnomalyFieldConfig::SyslogPriority { critical_codes } => {
                    self.syslog_priority(field, critical_codes, entries, &mut anomalies)
                }
            }
        }
        self.traffic_spikes(entries, &mut anomalies);

        anomalies.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        debug!("Detected {} anomalies", anomalies.len());
        anomalies
    }

    fn http_status(&self, field: &str, codes: &[&str], entries: &[LogEntry], out: &mut Vec<AnomalyResult>) {
        let observed: Vec<&LogEntry> = entries.iter().filter(|e| e.non_empty(field).is_some()).collect();
        if observed.is_empty() {
            return;
        }
        let threshold = ERROR_RATE_THRESHOLD_PCT * self.factor();

        for code in codes {
            let hits: Vec<&&LogEntry> = observed
                .iter()
                .filter(|e| e.get(field).map(str::trim) == Some(*code))
                .collect();
            let Some(first) = hits.first() else {
                continue;
            };

            let pct = percentage(hits.len(), observed.len());
            if pct > threshold {
                out.push(AnomalyResult {
                    observed_value: code.to_string(),
                    expected_value: Some(format!("<= {:.1}% of requests", threshold)),
                    confidence: (pct / 10.0).min(1.0),
                    description: format!(
                        "HTTP {} responses make up {:.1}% of requests ({} of {})",
                        code,
                        pct,
                        hits.len(),
                        observed.len()
                    ),
                    ..AnomalyResult::at(first, AnomalyType::HighErrorRate, Severity::High, field)
                });
            }
        }
    }

    fn log_level(&self, field: &str, levels: &[&str], entries: &[LogEntry], out: &mut Vec<AnomalyResult>) {
        let observed: Vec<&LogEntry> = entries.iter().filter(|e| e.non_empty(field).is_some()).collect();
        if observed.is_empty() {
            return;
        }
        let threshold = ERROR_LOG_THRESHOLD_PCT * self.factor();

        for level in levels {
            let hits: Vec<&&LogEntry> = observed
                .iter()
                .filter(|e| e.get(field).map_or(false, |v| v.trim().eq_ignore_ascii_case(level)))
                .collect();
            let Some(first) = hits.first() else {
                continue;
            };

            let pct = percentage(hits.len(), observed.len());
            if pct > threshold {
                out.push(AnomalyResult {
                    observed_value: level.to_string(),
                    expected_value: Some(format!("<= {:.1}% of entries", threshold)),
                    confidence: (pct / 20.0).min(1.0),
                    description: format!(
                        "{} level entries make up {:.1}% of logs ({} of {})",
                        level.to_uppercase(),
                        pct,
                        hits.len(),
                        observed.len()
                    ),
                    ..AnomalyResult::at(first, AnomalyType::HighErrorLogs, Severity::Medium, field)
                });
            }
        }
    }

    fn duration(&self, field: &str, unit: DurationUnit, entries: &[LogEntry], out: &mut Vec<AnomalyResult>) {
        let measured: Vec<(&LogEntry, f64)> = entries
            .iter()
            .filter_map(|e| e.get(field).and_then(parse_number).map(|d| (e, d)))
            .collect();
        let sorted = sorted_ascending(measured.iter().map(|(_, d)| *d).collect());
        // A zero p95 flags every positive duration at full confidence.
        let Some(p95) = percentile(&sorted, 0.95) else {
            return;
        };
        let limit = SLOW_RESPONSE_P95_FACTOR * self.factor() * p95;

        for (entry, d) in measured {
            if d > limit {
                out.push(AnomalyResult {
                    observed_value: format!("{}{}", d, unit.suffix()),
                    expected_value: Some(format!("<= {:.1}{}", limit, unit.suffix())),
                    confidence: (d / (p95 * 3.0)).min(1.0),
                    description: format!(
                        "{} of {}{} is more than {}x the p95 of {}{}",
                        field,
                        d,
                        unit.suffix(),
                        SLOW_RESPONSE_P95_FACTOR * self.factor(),
                        p95,
                        unit.suffix()
                    ),
                    ..AnomalyResult::at(entry, AnomalyType::SlowResponse, Severity::Medium, field)
                });
            }
        }
    }

    fn ip_address(&self, field: &str, entries: &[LogEntry], out: &mut Vec<AnomalyResult>) {
        let mut by_ip: IndexMap<&str, Vec<&LogEntry>> = IndexMap::new();
        for entry in entries {
            if let Some(ip) = entry.non_empty(field) {
                by_ip.entry(ip).or_default().push(entry);
            }
        }
        let total: usize = by_ip.values().map(Vec::len).sum();

        // More than 10 samples, unless the caller asked for a lower floor.
        let floor = if self.config.min_samples >= IP_CONCENTRATION_MIN_SAMPLES {
            IP_CONCENTRATION_MIN_SAMPLES
        } else {
            self.config.min_samples.saturating_sub(1)
        };
        if total <= floor {
            return;
        }
        let threshold = IP_CONCENTRATION_THRESHOLD_PCT * self.factor();

        for (ip, hits) in &by_ip {
            let pct = percentage(hits.len(), total);
            if pct > threshold {
                out.push(AnomalyResult {
                    observed_value: ip.to_string(),
                    expected_value: Some(format!("<= {:.1}% of traffic", threshold)),
                    confidence: (pct / 50.0).min(1.0),
                    description: format!(
                        "{} accounts for {:.1}% of traffic ({} of {} requests)",
                        ip,
                        pct,
                        hits.len(),
                        total
                    ),
                    ..AnomalyResult::at(hits[0], AnomalyType::HighTrafficIp, Severity::Low, field)
                });
            }
        }
    }

    fn syslog_priority(&self, field: &str, codes: &[u8], entries: &[LogEntry], out: &mut Vec<AnomalyResult>) {
        let priorities: Vec<(&LogEntry, u8)> = entries
            .iter()
            .filter_map(|e| {
                let priority: u16 = e.non_empty(field)?.trim().parse().ok()?;
                Some((e, (priority % 8) as u8))
            })
            .collect();
        if priorities.is_empty() {
            return;
        }

        let critical: Vec<&(&LogEntry, u8)> = priorities
            .iter()
            .filter(|(_, severity)| codes.contains(severity))
            .collect();
        let Some((first, _)) = critical.first() else {
            return;
        };

        let pct = percentage(critical.len(), priorities.len());
        let threshold = ERROR_LOG_THRESHOLD_PCT * self.factor();
        if pct > threshold {
            out.push(AnomalyResult {
                observed_value: format!("{} critical entries", critical.len()),
                expected_value: Some(format!("<= {:.1}% of entries", threshold)),
                confidence: (pct / 20.0).min(1.0),
                description: format!(
                    "{:.1}% of syslog entries have severity error or worse ({} of {})",
                    pct,
                    critical.len(),
                    priorities.len()
                ),
                ..AnomalyResult::at(first, AnomalyType::HighErrorLogs, Severity::Medium, field)
            });
        }
    }

    fn traffic_spikes(&self, entries: &[LogEntry], out: &mut Vec<AnomalyResult>) {
        let window_ms = i64::from(self.config.time_window_minutes.max(1)) * 60_000;
        let mut buckets: BTreeMap<i64, Vec<&LogEntry>> = BTreeMap::new();
        for entry in entries {
            if let Some(ts) = entry.parsed_timestamp {
                buckets
                    .entry(ts.timestamp_millis().div_euclid(window_ms))
                    .or_default()
                    .push(entry);
            }
        }
        if buckets.len() <= MIN_SPIKE_BUCKETS {
            return;
        }

        let sizes: Vec<f64> = buckets.values().map(|b| b.len() as f64).collect();
        let Some((mean, std_dev)) = mean_std_dev(&sizes) else {
            return;
        };
        let sorted = sorted_ascending(sizes);
        let p95 = percentile(&sorted, 0.95).unwrap_or(0.0);
        let limit = mean + SPIKE_SIGMA * self.factor() * std_dev;

        for (bucket, members) in &buckets {
            let size = members.len() as f64;
            if size <= limit || p95 <= 0.0 {
                continue;
            }
            let severity = if size > mean + SPIKE_CRITICAL_SIGMA * std_dev {
                Severity::High
            } else {
                Severity::Medium
            };
            let start = Utc.timestamp_millis_opt(bucket * window_ms).single();

            out.push(AnomalyResult {
                observed_value: format!("{} events", members.len()),
                expected_value: Some(format!("<= {:.1} events", limit)),
                confidence: (size / (p95 * 3.0)).min(1.0),
                description: format!(
                    "{} events in a {}-minute window (mean {:.1}, stddev {:.1})",
                    members.len(),
                    self.config.time_window_minutes,
                    mean,
                    std_dev
                ),
                timestamp: start,
                ..AnomalyResult::at(members[0], AnomalyType::TrafficSpike, severity, "timestamp")
            });
        }
    }
}
