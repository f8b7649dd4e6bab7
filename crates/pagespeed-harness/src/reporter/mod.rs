//! Run report output
//!
//! Formats a [`RunReport`] for people or for machines.
//!
//! # Output Formats
//!
//! - **Console**: per-URL verdict lines with pass/fail markers
//! - **JSON**: machine-readable format for CI pipelines
//! - **JSON (pretty)**: indented JSON
//!
//! # Example
//!
//! ```no_run
//! use pagespeed_harness::reporter::{Reporter, OutputFormat};
//! use pagespeed_harness::orchestrator::RunReport;
//!
//! # fn example(report: RunReport) -> anyhow::Result<()> {
//! let reporter = Reporter::new(OutputFormat::Console);
//! reporter.report(&report)?;
//!
//! // Or write to a file
//! Reporter::new(OutputFormat::Json)
//!     .write_to_file(&report, "pagespeed-report.json")?;
//! # Ok(())
//! # }
//! ```

mod console;
mod json;

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use crate::orchestrator::RunReport;

pub use console::ConsoleReporter;
pub use json::JsonReporter;

/// Output format for run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable verdict listing
    #[default]
    Console,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Console => "console",
            OutputFormat::Json => "json",
            OutputFormat::JsonPretty => "json-pretty",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(OutputFormat::Console),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" => Ok(OutputFormat::JsonPretty),
            other => Err(format!(
                "unknown format '{}'. expected console | json | json-pretty",
                other
            )),
        }
    }
}

/// Reporter for run reports
pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Report to stdout
    pub fn report(&self, report: &RunReport) -> Result<()> {
        let output = self.format_report(report)?;
        print!("{}", output);
        io::stdout().flush()?;
        Ok(())
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, report: &RunReport, path: P) -> Result<()> {
        let path = path.as_ref();
        let output = self.format_report(report)?;
        fs::write(path, output)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        Ok(())
    }

    pub fn format_report(&self, report: &RunReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => JsonReporter::format(report, false),
            OutputFormat::JsonPretty => JsonReporter::format(report, true),
            OutputFormat::Console => ConsoleReporter::format(report),
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}
