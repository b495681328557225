use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::input::LogEntry;

const SPIKE_BUCKET_MINUTES: i64 = 5;
const MAX_SPIKES: usize = 5;
const MAX_PEAK_HOURS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeAnalysis {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_label: String,
    pub activity_pattern: String,
    pub spikes: Vec<TimeBucket>,
    pub hourly_distribution: BTreeMap<u32, usize>,
    pub peak_hours: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    /// `HH:MM` of the bucket start.
    pub time: String,
    pub start: DateTime<Utc>,
    pub count: usize,
    /// Share of all timestamped entries, one decimal.
    pub percentage: f64,
}

/// `None` when no entry carries a timestamp.
pub fn analyze_time(entries: &[LogEntry]) -> Option<TimeAnalysis> {
    let timestamps: Vec<DateTime<Utc>> = entries.iter().filter_map(|e| e.parsed_timestamp).collect();
    let start_time = *timestamps.iter().min()?;
    let end_time = *timestamps.iter().max()?;

    let mut hourly_distribution: BTreeMap<u32, usize> = BTreeMap::new();
    for ts in &timestamps {
        *hourly_distribution.entry(ts.hour()).or_insert(0) += 1;
    }
    let peak_hours = peak_hours(&hourly_distribution);

    Some(TimeAnalysis {
        start_time,
        end_time,
        duration_label: duration_label(end_time - start_time),
        activity_pattern: activity_pattern(&peak_hours).to_string(),
        spikes: spikes(&timestamps),
        hourly_distribution,
        peak_hours,
    })
}

fn spikes(timestamps: &[DateTime<Utc>]) -> Vec<TimeBucket> {
    let width_ms = SPIKE_BUCKET_MINUTES * 60_000;
    let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
    for ts in timestamps {
        *buckets.entry(ts.timestamp_millis().div_euclid(width_ms)).or_insert(0) += 1;
    }

    let mut ranked: Vec<(i64, usize)> = buckets.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(MAX_SPIKES);

    let total = timestamps.len() as f64;
    ranked
        .into_iter()
        .filter_map(|(bucket, count)| {
            let start = Utc.timestamp_millis_opt(bucket * width_ms).single()?;
            Some(TimeBucket {
                time: start.format("%H:%M").to_string(),
                start,
                count,
                percentage: (count as f64 * 1000.0 / total).round() / 10.0,
            })
        })
        .collect()
}

/// Busiest hours of day, ties going to the earlier hour.
fn peak_hours(hourly: &BTreeMap<u32, usize>) -> Vec<u32> {
    let mut hours: Vec<(u32, usize)> = hourly.iter().map(|(h, c)| (*h, *c)).collect();
    hours.sort_by(|a, b| b.1.cmp(&a.1));
    hours.into_iter().take(MAX_PEAK_HOURS).map(|(h, _)| h).collect()
}

fn activity_pattern(peak_hours: &[u32]) -> &'static str {
    if peak_hours.len() < 2 {
        "Irregular activity"
    } else if peak_hours.iter().all(|h| (9..=17).contains(h)) {
        "Business hours activity"
    } else if peak_hours.iter().all(|h| *h >= 22 || *h <= 4) {
        "Night time activity"
    } else {
        "Mixed activity pattern"
    }
}

fn duration_label(span: Duration) -> String {
    let secs = span.num_seconds();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries_at(times: &[(u32, u32)]) -> Vec<LogEntry> {
        times
            .iter()
            .enumerate()
            .map(|(i, (hour, minute))| {
                let mut entry = LogEntry::new(i + 1, "");
                entry.parsed_timestamp = Some(Utc.with_ymd_and_hms(2023, 12, 10, *hour, *minute, 0).unwrap());
                entry
            })
            .collect()
    }

    #[test]
    fn test_no_timestamps_is_none() {
        assert!(analyze_time(&[LogEntry::new(1, "x")]).is_none());
        assert!(analyze_time(&[]).is_none());
    }

    #[test]
    fn test_business_hours() {
        let analysis = analyze_time(&entries_at(&[(9, 0), (9, 1), (10, 0), (14, 30)])).unwrap();
        assert_eq!(analysis.peak_hours, vec![9, 10, 14]);
        assert_eq!(analysis.activity_pattern, "Business hours activity");
        assert_eq!(analysis.duration_label, "5.5h");
        assert_eq!(analysis.hourly_distribution[&9], 2);
    }

    #[test]
    fn test_night_and_mixed_and_irregular() {
        let night = analyze_time(&entries_at(&[(23, 0), (1, 0), (3, 0)])).unwrap();
        assert_eq!(night.activity_pattern, "Night time activity");

        let mixed = analyze_time(&entries_at(&[(8, 0), (12, 0), (23, 0)])).unwrap();
        assert_eq!(mixed.activity_pattern, "Mixed activity pattern");

        let single_hour = analyze_time(&entries_at(&[(12, 0), (12, 30)])).unwrap();
        assert_eq!(single_hour.activity_pattern, "Irregular activity");
        assert_eq!(single_hour.duration_label, "30m");
    }

    #[test]
    fn test_spikes_are_top_buckets() {
        let mut times = vec![(10, 0), (10, 1), (10, 2), (10, 3)];
        for minute in [10, 20, 30, 40, 50, 55] {
            times.push((11, minute));
        }
        let analysis = analyze_time(&entries_at(&times)).unwrap();

        assert_eq!(analysis.spikes.len(), 5);
        assert_eq!(analysis.spikes[0].time, "10:00");
        assert_eq!(analysis.spikes[0].count, 4);
        assert_eq!(analysis.spikes[0].percentage, 40.0);
        assert_eq!(analysis.spikes[1].percentage, 10.0);
    }

    #[test]
    fn test_seconds_label() {
        let analysis = analyze_time(&entries_at(&[(10, 0)])).unwrap();
        assert_eq!(analysis.duration_label, "0s");
        assert_eq!(analysis.start_time, analysis.end_time);
    }
}
