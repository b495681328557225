use clap::{Args, Parser, Subcommand};
use logscope_core::{FilterOperator, FilterPredicate, Sensitivity};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "logscope",
    about = "Structured log analysis: field statistics, anomalies, correlations and traffic shape",
    version,
    author = "Logscope Team"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze log text from a file or stdin and print the JSON report
    Analyze(AnalyzeArgs),

    /// List the supported log formats
    Formats {
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct AnalyzeArgs {
    /// Log file to analyze (defaults to stdin)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Log format: nginx, apache, json, syslog or custom
    #[arg(short = 'F', long)]
    pub format: Option<String>,

    /// Regex with one capture group per field (custom format)
    #[arg(long)]
    pub custom_pattern: Option<String>,

    /// Comma-separated field names for the custom pattern's groups
    #[arg(long, value_delimiter = ',')]
    pub fields: Option<Vec<String>>,

    /// Only the first N lines are analyzed
    #[arg(short = 'n', long)]
    pub max_lines: Option<usize>,

    /// Filter as field:operator:value (repeatable, all must match)
    #[arg(long = "filter", value_parser = parse_filter)]
    pub filters: Vec<FilterPredicate>,

    /// Minimum number of entries before anomaly detection runs
    #[arg(long)]
    pub min_samples: Option<usize>,

    /// Spike detection window in minutes
    #[arg(long)]
    pub time_window: Option<u32>,

    /// Anomaly threshold sensitivity: low, medium or high
    #[arg(long)]
    pub sensitivity: Option<Sensitivity>,

    /// Skip anomaly detection
    #[arg(long)]
    pub no_anomalies: bool,

    /// Treat input as a {"logs", "config"} JSON envelope and ignore the flags above
    #[arg(long)]
    pub envelope: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,
}

/// Parses `field:operator:value`. The value may itself contain colons.
pub fn parse_filter(raw: &str) -> Result<FilterPredicate, String> {
    let mut parts = raw.splitn(3, ':');
    let (Some(field), Some(operator), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("Expected field:operator:value, got '{}'", raw));
    };
    if field.is_empty() {
        return Err(format!("Missing field name in filter '{}'", raw));
    }
    let operator: FilterOperator = operator.parse()?;

    Ok(FilterPredicate {
        field: field.to_string(),
        operator,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        let filter = parse_filter("url:regex:^/api:v2").unwrap();
        assert_eq!(filter.field, "url");
        assert_eq!(filter.operator, FilterOperator::Regex);
        assert_eq!(filter.value, "^/api:v2");

        assert!(parse_filter("status:gte").is_err());
        assert!(parse_filter(":eq:1").is_err());
        assert!(parse_filter("status:like:5").is_err());
    }
}
