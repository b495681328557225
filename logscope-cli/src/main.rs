use anyhow::Result;
use clap::Parser;
use logscope_cli::{render, run_analyze, Cli, Commands, FileConfig};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the JSON report; diagnostics go to stderr.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let file_config = FileConfig::load();
    debug!("Loaded config: {:?}", file_config);

    match cli.command {
        Commands::Analyze(args) => {
            let report = run_analyze(&args, &file_config).await?;
            println!("{}", render(&report, file_config.pretty(args.pretty))?);

            if let Some(message) = report.get("error") {
                error!("Analysis failed: {}", message);
                std::process::exit(1);
            }
        }
        Commands::Formats { pretty } => {
            let catalog = logscope_core::get_log_formats();
            println!("{}", render(&catalog, file_config.pretty(pretty))?);
        }
    }

    Ok(())
}
