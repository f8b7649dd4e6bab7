//! Page-load audit CLI
//!
//! Loads a TOML configuration, audits every URL and prints the report.
//! Exit status: 0 when every URL passed, 1 when any verdict failed or any
//! URL could not be audited, 2 when the run could not be carried out.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pagespeed_harness::{orchestrator, Config, OutputFormat, Provider, Reporter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pagespeed")]
#[command(version, about = "Audit page-load performance against Web Vitals thresholds")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Report format: console, json or json-pretty
    #[arg(short, long, default_value = "console")]
    format: OutputFormat,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Audits per URL (overrides the configuration)
    #[arg(long)]
    runs: Option<u32>,

    /// Provider (overrides the configuration)
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,

    /// URLs to audit (replace the configured list)
    urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Remote,
    Local,
}

impl From<ProviderArg> for Provider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Remote => Provider::Remote,
            ProviderArg::Local => Provider::Local,
        }
    }
}

fn apply_overrides(args: &Args, config: &mut Config) {
    if let Some(runs) = args.runs {
        config.audit.runs = runs;
    }
    if let Some(provider) = args.provider {
        config.audit.provider = provider.into();
    }
    if !args.urls.is_empty() {
        config.audit.urls = args.urls.clone();
    }
}

async fn run(args: Args) -> Result<bool> {
    let mut config = Config::from_file(&args.config)?;
    apply_overrides(&args, &mut config);

    let report = orchestrator::run(&config)
        .await
        .context("Audit run aborted")?;

    let reporter = Reporter::new(args.format);
    match &args.output {
        Some(path) => {
            reporter.write_to_file(&report, path)?;
            info!("Report written to {}", path.display());
        }
        None => reporter.report(&report)?,
    }

    Ok(report.passed)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Logs go to stderr so stdout carries only the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pagespeed_harness=info,pagespeed=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}
