// Logscope CLI library
//
// Argument model, config-file defaults and input decoding for the `logscope`
// binary.

use anyhow::Result;
use logscope_core::config::MAX_INPUT_BYTES;
use logscope_core::{error_value, process_request, process_with, AnalysisError, AnalysisRequest, Analyzer};
use serde_json::Value;
use tracing::info;

pub mod cli;
pub mod config;
pub mod input;

pub use cli::{AnalyzeArgs, Cli, Commands};
pub use config::FileConfig;
pub use input::{decode_bytes, read_log_file, read_stdin};

/// Reads the input named by `args` and returns the report (or error document).
pub async fn run_analyze(args: &AnalyzeArgs, file_config: &FileConfig) -> Result<Value> {
    let text = match &args.file {
        Some(path) => read_log_file(path).await?,
        None => {
            info!("Reading log text from stdin");
            read_stdin().await?
        }
    };
    Ok(analyze_text(&text, args, file_config))
}

pub fn analyze_text(text: &str, args: &AnalyzeArgs, file_config: &FileConfig) -> Value {
    let analyzer = Analyzer::new();
    if args.envelope {
        return process_with(&analyzer, text);
    }

    if text.len() > MAX_INPUT_BYTES {
        return error_value(&AnalysisError::InputTooLarge {
            size: text.len(),
            limit: MAX_INPUT_BYTES,
        });
    }
    let request = AnalysisRequest::new(text, file_config.analysis_config(args));
    process_request(&analyzer, &request)
}

pub fn render(value: &Value, pretty: bool) -> Result<String> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}
