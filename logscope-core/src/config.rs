use serde::{Deserialize, Serialize};

use crate::filter::FilterPredicate;

pub const DEFAULT_FORMAT: &str = "nginx";
pub const DEFAULT_MAX_LINES: usize = 100;
pub const DEFAULT_TIME_WINDOW_MINUTES: u32 = 5;
pub const DEFAULT_MIN_SAMPLES: usize = 10;
/// Upper bound on the raw text accepted by one invocation.
pub const MAX_INPUT_BYTES: usize = 5 * 1024 * 1024;

/// Scales the fixed anomaly thresholds. `Medium` leaves them untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    pub fn threshold_factor(&self) -> f64 {
        match self {
            Sensitivity::Low => 1.5,
            Sensitivity::Medium => 1.0,
            Sensitivity::High => 0.75,
        }
    }
}

impl std::str::FromStr for Sensitivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Sensitivity::Low),
            "medium" => Ok(Sensitivity::Medium),
            "high" => Ok(Sensitivity::High),
            _ => Err(format!(
                "Invalid sensitivity: {}. Must be 'low', 'medium', or 'high'",
                s
            )),
        }
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensitivity::Low => write!(f, "low"),
            Sensitivity::Medium => write!(f, "medium"),
            Sensitivity::High => write!(f, "high"),
        }
    }
}

/// The `config` object of a request envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    pub format: String,
    pub custom_pattern: Option<String>,
    pub fields: Option<Vec<String>>,
    pub filters: Vec<FilterPredicate>,
    pub max_lines: usize,
    pub anomaly_detection: bool,
    pub sensitivity: Sensitivity,
    pub time_window: u32,
    pub min_samples: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            custom_pattern: None,
            fields: None,
            filters: Vec::new(),
            max_lines: DEFAULT_MAX_LINES,
            anomaly_detection: true,
            sensitivity: Sensitivity::default(),
            time_window: DEFAULT_TIME_WINDOW_MINUTES,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

impl AnalysisConfig {
    pub fn anomaly_config(&self) -> AnomalyConfig {
        AnomalyConfig {
            enabled: self.anomaly_detection,
            sensitivity: self.sensitivity,
            time_window_minutes: self.time_window.max(1),
            min_samples: self.min_samples,
        }
    }
}

/// Gates the anomaly detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyConfig {
    pub enabled: bool,
    pub sensitivity: Sensitivity,
    pub time_window_minutes: u32,
    /// Below this many entries no anomaly or spike computation runs.
    pub min_samples: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        AnalysisConfig::default().anomaly_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(config.format, "json");
        assert_eq!(config.max_lines, 100);
        assert!(config.anomaly_detection);
        assert_eq!(config.sensitivity, Sensitivity::Medium);
        assert_eq!(config.time_window, 5);
        assert_eq!(config.min_samples, 10);
        assert!(config.filters.is_empty());
    }

    #[test]
    fn test_camel_case_keys() {
        let config: AnalysisConfig = serde_json::from_str(
            r#"{"customPattern":"^(\\w+)$","fields":["word"],"maxLines":5,"anomalyDetection":false,"sensitivity":"high","timeWindow":0,"minSamples":2}"#,
        )
        .unwrap();
        assert_eq!(config.custom_pattern.as_deref(), Some(r"^(\w+)$"));
        assert_eq!(config.fields, Some(vec!["word".to_string()]));
        assert_eq!(config.max_lines, 5);

        let anomaly = config.anomaly_config();
        assert!(!anomaly.enabled);
        assert_eq!(anomaly.sensitivity, Sensitivity::High);
        assert_eq!(anomaly.time_window_minutes, 1);
        assert_eq!(anomaly.min_samples, 2);
    }

    #[test]
    fn test_unknown_sensitivity_is_rejected() {
        assert!(serde_json::from_str::<AnalysisConfig>(r#"{"sensitivity":"extreme"}"#).is_err());
        assert!("extreme".parse::<Sensitivity>().is_err());
        assert_eq!("LOW".parse::<Sensitivity>(), Ok(Sensitivity::Low));
    }
}
