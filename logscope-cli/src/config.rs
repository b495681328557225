use anyhow::{Context, Result};
use logscope_core::{AnalysisConfig, Sensitivity};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::cli::AnalyzeArgs;

/// Optional defaults read from `<config_dir>/logscope/config.toml`.
///
/// ```toml
/// [analysis]
/// format = "json"
/// max_lines = 500
/// sensitivity = "high"
///
/// [output]
/// pretty = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub analysis: AnalysisDefaults,
    pub output: OutputDefaults,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisDefaults {
    pub format: Option<String>,
    pub max_lines: Option<usize>,
    pub min_samples: Option<usize>,
    pub time_window: Option<u32>,
    pub sensitivity: Option<Sensitivity>,
    pub anomaly_detection: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputDefaults {
    pub pretty: Option<bool>,
}

impl FileConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("logscope").join("config.toml"))
    }

    /// Loads the user config, falling back to defaults when it is missing or
    /// unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config file {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Engine configuration: command-line flags first, then this file, then
    /// the engine defaults.
    pub fn analysis_config(&self, args: &AnalyzeArgs) -> AnalysisConfig {
        let defaults = AnalysisConfig::default();
        let file = &self.analysis;

        AnalysisConfig {
            format: args
                .format
                .clone()
                .or_else(|| file.format.clone())
                .unwrap_or(defaults.format),
            custom_pattern: args.custom_pattern.clone(),
            fields: args.fields.clone(),
            filters: args.filters.clone(),
            max_lines: args.max_lines.or(file.max_lines).unwrap_or(defaults.max_lines),
            anomaly_detection: !args.no_anomalies
                && file.anomaly_detection.unwrap_or(defaults.anomaly_detection),
            sensitivity: args.sensitivity.or(file.sensitivity).unwrap_or(defaults.sensitivity),
            time_window: args.time_window.or(file.time_window).unwrap_or(defaults.time_window),
            min_samples: args.min_samples.or(file.min_samples).unwrap_or(defaults.min_samples),
        }
    }

    pub fn pretty(&self, args_pretty: bool) -> bool {
        args_pretty || self.output.pretty.unwrap_or(false)
    }
}
