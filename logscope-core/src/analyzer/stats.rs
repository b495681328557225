use indexmap::IndexMap;
use serde::Serialize;

use crate::filter::parse_number;
use crate::input::LogEntry;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStatResult {
    pub field: String,
    pub count: usize,
    pub unique_count: usize,
    pub distribution: IndexMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub percentiles: Percentiles,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Percentiles {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Nearest-rank percentile: `sorted[floor(len * fraction)]`, no interpolation.
pub fn percentile(sorted: &[f64], fraction: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let index = ((sorted.len() as f64) * fraction).floor() as usize;
    Some(sorted[index.min(sorted.len() - 1)])
}

/// Population mean and standard deviation (divides by N).
pub fn mean_std_dev(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

pub fn sorted_ascending(mut values: Vec<f64>) -> Vec<f64> {
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

impl NumericSummary {
    pub fn from_values(values: Vec<f64>) -> Option<Self> {
        let sorted = sorted_ascending(values);
        let (mean, std_dev) = mean_std_dev(&sorted)?;
        let rank = |fraction| percentile(&sorted, fraction).unwrap_or(0.0);
        let p50 = rank(0.5);

        Some(Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean,
            median: p50,
            std_dev,
            percentiles: Percentiles {
                p25: rank(0.25),
                p50,
                p75: rank(0.75),
                p95: rank(0.95),
                p99: rank(0.99),
            },
        })
    }
}

/// Statistics for every field present in at least one entry, in order of
/// first appearance.
pub fn compute_field_stats(entries: &[LogEntry]) -> IndexMap<String, FieldStatResult> {
    let mut values_by_field: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for entry in entries {
        for (field, value) in &entry.fields {
            values_by_field.entry(field.as_str()).or_default().push(value.as_str());
        }
    }

    values_by_field
        .into_iter()
        .map(|(field, values)| (field.to_string(), field_stats(field, &values)))
        .collect()
}

fn field_stats(field: &str, values: &[&str]) -> FieldStatResult {
    let mut distribution: IndexMap<String, usize> = IndexMap::new();
    for value in values {
        *distribution.entry((*value).to_string()).or_insert(0) += 1;
    }

    let numbers: Vec<f64> = values.iter().filter_map(|v| parse_number(v)).collect();
    // Substantially numeric: more than half of the values are numbers.
    let numeric = if numbers.len() * 2 > values.len() {
        NumericSummary::from_values(numbers)
    } else {
        None
    };

    FieldStatResult {
        field: field.to_string(),
        count: values.len(),
        unique_count: distribution.len(),
        distribution,
        numeric,
    }
}
