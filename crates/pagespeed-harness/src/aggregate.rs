//! Multi-run score aggregation
//!
//! Lab measurements of the same page vary from run to run. The
//! [`MultiRunAggregator`] audits a URL N times in a row and averages the
//! performance score. The mean only exists if every run succeeded: one
//! failed run fails the whole series, so a mean is never taken over fewer
//! samples than requested.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::adapter::MetricSource;
use crate::error::{AggregationFailure, AuditError};
use crate::metrics::MetricSet;
use crate::runner::{AuditRunner, AuditSession};
use crate::stats::ScoreSummary;

/// Outcome of N successful runs of one URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedScore {
    pub url: String,
    /// Performance score (0-100) of each run, in run order
    pub per_run_scores: Vec<f64>,
    /// Arithmetic mean of `per_run_scores`
    pub mean: f64,
    pub summary: ScoreSummary,
    /// Per-metric mean over all runs, diagnostics of the first run
    pub mean_metrics: MetricSet,
    /// Every run's session, in run order
    pub runs: Vec<AuditSession>,
}

/// Runs a URL repeatedly and averages the results
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiRunAggregator {
    runner: AuditRunner,
}

impl MultiRunAggregator {
    pub fn new(runner: AuditRunner) -> Self {
        Self { runner }
    }

    /// Audit `url` `n` times sequentially
    ///
    /// Runs are never overlapped: the local provider drives a single browser
    /// that cannot serve two audits at once.
    ///
    /// # Errors
    ///
    /// An [`AggregationFailure`] naming the first failed run (1-based). A run
    /// without a performance score fails with [`AuditError::Parse`]. `n = 0`
    /// fails with [`AuditError::Configuration`] and `failed_at_run = 0`
    /// before anything is audited.
    #[instrument(skip(self, source))]
    pub async fn run_n(
        &self,
        url: &str,
        source: &dyn MetricSource,
        n: u32,
    ) -> Result<AggregatedScore, AggregationFailure> {
        if n == 0 {
            return Err(zero_runs(url));
        }

        let mut runs = Vec::with_capacity(n as usize);
        let mut per_run_scores = Vec::with_capacity(n as usize);

        for run in 1..=n {
            let fail = |cause: AuditError| AggregationFailure {
                url: url.to_string(),
                failed_at_run: run,
                runs: n,
                source: cause,
            };

            let session = self
                .runner
                .audit(url, source)
                .await
                .map_err(|failure| fail(failure.source))?;
            let score = session.metrics.performance_score().ok_or_else(|| {
                fail(AuditError::Parse(
                    "report has no performance category score".to_string(),
                ))
            })?;

            info!("Run {}/{} scored {:.1}", run, n, score);
            per_run_scores.push(score);
            runs.push(session);
        }

        let sets: Vec<MetricSet> = runs.iter().map(|s| s.metrics.clone()).collect();
        let (Some(summary), Some(mean_metrics)) = (
            ScoreSummary::from_samples(&per_run_scores),
            MetricSet::mean_of(&sets),
        ) else {
            return Err(zero_runs(url));
        };

        info!(
            mean = summary.mean,
            std_dev = summary.std_dev,
            "Aggregated {} runs",
            n
        );

        Ok(AggregatedScore {
            url: url.to_string(),
            mean: summary.mean,
            per_run_scores,
            summary,
            mean_metrics,
            runs,
        })
    }
}

fn zero_runs(url: &str) -> AggregationFailure {
    AggregationFailure {
        url: url.to_string(),
        failed_at_run: 0,
        runs: 0,
        source: AuditError::Configuration("run count must be at least 1".to_string()),
    }
}
