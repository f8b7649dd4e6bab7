//! Console reporter for run reports
//!
//! Lists every URL with one line per verdict and the full verdict message
//! under each failure.

use anyhow::Result;
use std::fmt::Write;

use crate::evaluate::Verdict;
use crate::metrics::MetricName;
use crate::orchestrator::{RunReport, UrlReport};

/// Console format reporter
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn format(report: &RunReport) -> Result<String> {
        let mut output = String::new();

        // Header
        writeln!(output)?;
        writeln!(output, "╔══════════════════════════════════════════════════════════════╗")?;
        writeln!(output, "║                    PAGE SPEED AUDIT                          ║")?;
        writeln!(output, "╚══════════════════════════════════════════════════════════════╝")?;
        writeln!(output)?;

        writeln!(output, "Provider:  {}", report.provider.as_str())?;
        writeln!(output, "Runs/URL:  {}", report.runs_per_url)?;
        writeln!(output, "Started:   {}", report.started_at.to_rfc3339())?;
        writeln!(output, "Duration:  {}ms", report.duration_ms)?;
        writeln!(output)?;

        for url in &report.urls {
            Self::format_url(&mut output, url)?;
        }

        // Summary
        writeln!(output, "────────────────────────────────────────────────────────────────")?;
        let status = if report.passed { "PASSED" } else { "FAILED" };
        let status_symbol = if report.passed { "✓" } else { "✗" };
        let failed = report.failed_urls().count();
        writeln!(
            output,
            "Overall Status: {} {} ({}/{} URLs passed)",
            status_symbol,
            status,
            report.urls.len() - failed,
            report.urls.len()
        )?;

        writeln!(output)?;
        Ok(output)
    }

    fn format_url(output: &mut String, url: &UrlReport) -> Result<()> {
        let status = if url.passed { "✓" } else { "✗" };

        writeln!(output, "────────────────────────────────────────────────────────────────")?;
        writeln!(output, "URL: {} {}", url.url, status)?;
        writeln!(output, "────────────────────────────────────────────────────────────────")?;

        if let Some(ref error) = url.error {
            writeln!(output, "  Error: {}", error)?;
            writeln!(output)?;
            return Ok(());
        }

        match (url.score, &url.summary) {
            (Some(score), Some(summary)) => writeln!(
                output,
                "  Score: {:.1} (mean of {} runs, min {:.1}, max {:.1}, std dev {:.2})",
                score, summary.count, summary.min, summary.max, summary.std_dev
            )?,
            (Some(score), None) => writeln!(output, "  Score: {:.1}", score)?,
            (None, _) => writeln!(output, "  Score: unavailable")?,
        }
        writeln!(output)?;

        for verdict in &url.verdicts {
            Self::format_verdict(output, verdict)?;
        }

        writeln!(output)?;
        Ok(())
    }

    fn format_verdict(output: &mut String, verdict: &Verdict) -> Result<()> {
        let mark = if verdict.passed { "✓" } else { "✗" };
        let unit = verdict.metric.unit();

        writeln!(
            output,
            "  {} {:<4} {:>10}   (expected {} {}{})",
            mark,
            verdict.metric.as_str(),
            match verdict.actual {
                Some(v) => format!("{}{}", format_value(verdict.metric, v), unit),
                None => "n/a".to_string(),
            },
            verdict.comparator,
            format_value(verdict.metric, verdict.threshold),
            unit
        )?;

        if !verdict.passed {
            writeln!(output, "      {}", verdict.message)?;
        }
        Ok(())
    }
}

fn format_value(metric: MetricName, v: f64) -> String {
    match metric {
        MetricName::Cls => format!("{:.3}", v),
        _ => format!("{:.0}", v),
    }
}
