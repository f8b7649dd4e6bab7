//! Run orchestration
//!
//! The orchestrator walks the URL list, audits each URL (once, or N times
//! through the [`MultiRunAggregator`]), evaluates the result against the
//! threshold policy and collects everything into a [`RunReport`].
//!
//! Failure scoping:
//!
//! - A failing threshold is data: it shows up as a failing [`Verdict`] and
//!   the run continues.
//! - Network, timeout and parse errors are recorded on that URL's
//!   [`UrlReport`] and the run continues with the next URL.
//! - Configuration and launch errors end the whole run with `Err`.
//!
//! Remote audits of distinct URLs overlap up to the configured concurrency;
//! local audits are strictly sequential, each URL getting its own
//! [`BrowserSession`] that is closed before the next one launches.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

use crate::adapter::{LighthouseCli, LocalBrowserAuditAdapter, MetricSource, RemoteAuditAdapter};
use crate::aggregate::MultiRunAggregator;
use crate::browser::{BrowserLauncher, BrowserSession, SessionEndpoint};
use crate::config::{Config, Provider};
use crate::error::AuditError;
use crate::evaluate::{all_passed, evaluate, ThresholdPolicy, Verdict};
use crate::metrics::MetricSet;
use crate::runner::AuditRunner;
use crate::stats::ScoreSummary;

/// Outcome for one URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlReport {
    pub url: String,
    pub provider: Provider,
    /// One verdict per policy entry; empty when the audit failed
    pub verdicts: Vec<Verdict>,
    /// Performance score (0-100), averaged when several runs were made
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub per_run_scores: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ScoreSummary>,
    /// Why the URL could not be audited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub passed: bool,
}

impl UrlReport {
    fn failed(url: &str, provider: Provider, error: String) -> Self {
        Self {
            url: url.to_string(),
            provider,
            verdicts: Vec::new(),
            score: None,
            per_run_scores: Vec::new(),
            summary: None,
            error: Some(error),
            passed: false,
        }
    }

    /// Failing verdicts only
    pub fn failures(&self) -> impl Iterator<Item = &Verdict> {
        self.verdicts.iter().filter(|v| !v.passed)
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub provider: Provider,
    pub runs_per_url: u32,
    /// In input URL order
    pub urls: Vec<UrlReport>,
    /// True only if every URL was audited and every verdict passed
    pub passed: bool,
}

impl RunReport {
    pub fn failed_urls(&self) -> impl Iterator<Item = &UrlReport> {
        self.urls.iter().filter(|u| !u.passed)
    }
}

/// Drives audits of a URL list
#[derive(Debug, Clone)]
pub struct Orchestrator {
    policy: ThresholdPolicy,
    runs: u32,
    runner: AuditRunner,
    concurrency: usize,
}

impl Orchestrator {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self {
            policy,
            runs: 1,
            runner: AuditRunner::default(),
            concurrency: 4,
        }
    }

    /// Build from a validated configuration
    pub fn from_config(config: &Config) -> Result<Self, AuditError> {
        Ok(Self::new(config.threshold_policy()?)
            .with_runs(config.audit.runs)
            .with_timeout(config.audit.timeout())
            .with_concurrency(config.audit.concurrency))
    }

    pub fn with_runs(mut self, runs: u32) -> Self {
        self.runs = runs;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.runner = AuditRunner::new(timeout);
        self
    }

    /// Values below 1 are treated as 1
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    fn check_runs(&self) -> Result<(), AuditError> {
        if self.runs == 0 {
            return Err(AuditError::Configuration(
                "runs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Audit and evaluate one URL
    ///
    /// Returns `Err` only for fatal errors; everything else is recorded on
    /// the report.
    async fn audit_url(&self, url: &str, source: &dyn MetricSource) -> Result<UrlReport, AuditError> {
        let provider = source.provider();

        let measured = if self.runs > 1 {
            MultiRunAggregator::new(self.runner)
                .run_n(url, source, self.runs)
                .await
                .map(|agg| Measurement {
                    metrics: agg.mean_metrics,
                    score: Some(agg.mean),
                    per_run_scores: agg.per_run_scores,
                    summary: Some(agg.summary),
                })
                .map_err(|failure| {
                    let message = failure.to_string();
                    (failure.source, message)
                })
        } else {
            self.runner
                .audit(url, source)
                .await
                .map(|session| Measurement {
                    score: session.metrics.performance_score(),
                    metrics: session.metrics,
                    per_run_scores: Vec::new(),
                    summary: None,
                })
                .map_err(|failure| {
                    let message = failure.to_string();
                    (failure.source, message)
                })
        };

        let measurement = match measured {
            Ok(measurement) => measurement,
            Err((cause, message)) if cause.is_fatal() => {
                error!("{}", message);
                return Err(cause);
            }
            Err((_, message)) => {
                warn!("{}", message);
                return Ok(UrlReport::failed(url, provider, message));
            }
        };

        let verdicts = evaluate(&measurement.metrics, &self.policy);
        let passed = all_passed(&verdicts);
        for verdict in verdicts.iter().filter(|v| !v.passed) {
            warn!("{}", verdict.message);
        }
        info!(url, passed, score = measurement.score, "URL evaluated");

        Ok(UrlReport {
            url: url.to_string(),
            provider,
            verdicts,
            score: measurement.score,
            per_run_scores: measurement.per_run_scores,
            summary: measurement.summary,
            error: None,
            passed,
        })
    }

    /// Audit `urls` through a remote provider
    ///
    /// Up to `concurrency` URLs are in flight at once. Reports come back in
    /// input order. The first fatal error cancels the audits still running.
    #[instrument(skip(self, urls, source), fields(urls = urls.len(), runs = self.runs))]
    pub async fn run_remote(
        &self,
        urls: &[String],
        source: &dyn MetricSource,
    ) -> Result<RunReport, AuditError> {
        self.check_runs()?;
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            "Auditing {} URL(s) via {} ({} in flight)",
            urls.len(),
            source.provider().as_str(),
            self.concurrency
        );

        let reports: Vec<UrlReport> = stream::iter(urls)
            .map(|url| self.audit_url(url, source))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(self.finish(started_at, start, source.provider(), reports))
    }

    /// Audit `urls` through local browsers
    ///
    /// For each URL a fresh browser is launched, `adapter_for` builds an
    /// adapter bound to its endpoint, and the browser is closed once the
    /// URL is done, whatever the outcome. A launch failure ends the run.
    #[instrument(skip(self, urls, launcher, adapter_for), fields(urls = urls.len(), runs = self.runs))]
    pub async fn run_local<A, F>(
        &self,
        urls: &[String],
        launcher: &BrowserLauncher,
        adapter_for: F,
    ) -> Result<RunReport, AuditError>
    where
        A: MetricSource,
        F: Fn(&SessionEndpoint) -> A,
    {
        self.check_runs()?;
        let started_at = Utc::now();
        let start = Instant::now();

        info!("Auditing {} URL(s) via local browser", urls.len());

        let mut reports = Vec::with_capacity(urls.len());
        for url in urls {
            let mut session = BrowserSession::new(launcher.clone());
            if let Err(e) = session.launch().await {
                error!("Aborting run: {}", e);
                return Err(e);
            }

            let result = match session.endpoint() {
                Ok(endpoint) => {
                    let source = adapter_for(&endpoint);
                    self.audit_url(url, &source).await
                }
                Err(e) => Err(e),
            };
            session.close().await;

            reports.push(result?);
        }

        Ok(self.finish(started_at, start, Provider::Local, reports))
    }

    fn finish(
        &self,
        started_at: DateTime<Utc>,
        start: Instant,
        provider: Provider,
        urls: Vec<UrlReport>,
    ) -> RunReport {
        let passed = urls.iter().all(|u| u.passed);
        let report = RunReport {
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            provider,
            runs_per_url: self.runs,
            urls,
            passed,
        };

        let failed = report.failed_urls().count();
        if passed {
            info!(
                "All {} URL(s) passed in {}ms",
                report.urls.len(),
                report.duration_ms
            );
        } else {
            warn!("{} of {} URL(s) failed", failed, report.urls.len());
        }
        report
    }
}

struct Measurement {
    metrics: MetricSet,
    score: Option<f64>,
    per_run_scores: Vec<f64>,
    summary: Option<ScoreSummary>,
}

/// Validate `config`, build the configured provider and audit every URL
///
/// # Example
///
/// ```no_run
/// use pagespeed_harness::{orchestrator, Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_file("pagespeed.toml")?;
/// let report = orchestrator::run(&config).await?;
/// std::process::exit(if report.passed { 0 } else { 1 });
/// # }
/// ```
pub async fn run(config: &Config) -> Result<RunReport, AuditError> {
    config.validate()?;
    let orchestrator = Orchestrator::from_config(config)?;
    let metric_ids = config
        .metric_ids()?
        .only(orchestrator.policy().entries().iter().map(|t| t.metric));

    match config.audit.provider {
        Provider::Remote => {
            let adapter = RemoteAuditAdapter::from_config(&config.remote, metric_ids)?;
            orchestrator.run_remote(&config.audit.urls, &adapter).await
        }
        Provider::Local => {
            let launcher = BrowserLauncher::from(&config.local);
            let engine = LighthouseCli::from(&config.local);
            orchestrator
                .run_local(&config.audit.urls, &launcher, |endpoint| {
                    LocalBrowserAuditAdapter::new(engine.clone(), endpoint.clone())
                        .with_metric_ids(metric_ids.clone())
                })
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterResponse;
    use crate::metrics::MetricName;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers per URL: URLs containing "broken" fail with a network error,
    /// "slow" sleeps past any short timeout, "fatal" fails with a
    /// configuration error; everything else gets the reference metrics
    struct StubSource {
        calls: AtomicU32,
    }

    impl StubSource {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl MetricSource for StubSource {
        fn provider(&self) -> Provider {
            Provider::Remote
        }

        async fn audit(&self, url: &str) -> Result<AdapterResponse, AuditError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if url.contains("broken") {
                return Err(AuditError::Network("PageSpeed returned HTTP 500".into()));
            }
            if url.contains("fatal") {
                return Err(AuditError::Configuration("API key rejected".into()));
            }
            if url.contains("slow") {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }

            let lcp = if url.contains("fast") { 1200.0 } else { 2600.0 };
            Ok(AdapterResponse {
                metrics: MetricSet::from_values(
                    url,
                    &[
                        (MetricName::Fcp, 1700.0),
                        (MetricName::Lcp, lcp),
                        (MetricName::Cls, 0.05),
                        (MetricName::Tbt, 150.0),
                        (MetricName::Fid, 80.0),
                        (MetricName::Inp, 180.0),
                    ],
                )
                .with_score(87.0),
                diagnostics: vec![json!({"numRequests": 30})],
                raw: json!({}),
            })
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_failing_verdict_does_not_stop_run() {
        let source = StubSource::new();
        let report = Orchestrator::new(ThresholdPolicy::default())
            .run_remote(&urls(&["https://a.test/", "https://fast.test/"]), &source)
            .await
            .unwrap();

        assert_eq!(report.urls.len(), 2);
        assert!(!report.passed);

        let first = &report.urls[0];
        assert!(!first.passed);
        assert_eq!(first.verdicts.len(), 6);
        let failed: Vec<MetricName> = first.failures().map(|v| v.metric).collect();
        assert_eq!(failed, vec![MetricName::Lcp]);

        assert!(report.urls[1].passed);
        assert_eq!(report.urls[1].score, Some(87.0));
    }

    #[tokio::test]
    async fn test_network_error_is_recorded_and_run_continues() {
        let source = StubSource::new();
        let report = Orchestrator::new(ThresholdPolicy::default())
            .run_remote(
                &urls(&["https://broken.test/", "https://fast.test/"]),
                &source,
            )
            .await
            .unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        let broken = &report.urls[0];
        assert!(!broken.passed);
        assert!(broken.verdicts.is_empty());
        assert!(broken.error.as_deref().unwrap().contains("HTTP 500"));
        assert!(report.urls[1].passed);
        assert!(!report.passed);
    }

    #[tokio::test]
    async fn test_timeout_is_recorded_and_next_url_audited() {
        let source = StubSource::new();
        let report = Orchestrator::new(ThresholdPolicy::default())
            .with_timeout(Duration::from_millis(50))
            .with_concurrency(1)
            .run_remote(&urls(&["https://slow.test/", "https://fast.test/"]), &source)
            .await
            .unwrap();

        assert!(report.urls[0].error.as_deref().unwrap().contains("timed out"));
        assert!(report.urls[1].passed);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_run() {
        let source = StubSource::new();
        let err = Orchestrator::new(ThresholdPolicy::default())
            .with_concurrency(1)
            .run_remote(
                &urls(&["https://fatal.test/", "https://fast.test/"]),
                &source,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AuditError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_reports_keep_url_order_under_concurrency() {
        let source = StubSource::new();
        let list = urls(&[
            "https://fast.test/1",
            "https://a.test/2",
            "https://fast.test/3",
            "https://broken.test/4",
            "https://fast.test/5",
        ]);
        let report = Orchestrator::new(ThresholdPolicy::default())
            .with_concurrency(3)
            .run_remote(&list, &source)
            .await
            .unwrap();

        let order: Vec<&str> = report.urls.iter().map(|u| u.url.as_str()).collect();
        assert_eq!(order, list.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_multiple_runs_report_mean_and_series() {
        let source = StubSource::new();
        let report = Orchestrator::new(ThresholdPolicy::default())
            .with_runs(3)
            .run_remote(&urls(&["https://fast.test/"]), &source)
            .await
            .unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        let url = &report.urls[0];
        assert_eq!(url.score, Some(87.0));
        assert_eq!(url.per_run_scores, vec![87.0; 3]);
        assert_eq!(url.summary.as_ref().map(|s| s.count), Some(3));
        assert_eq!(report.runs_per_url, 3);
    }

    #[tokio::test]
    async fn test_aggregation_failure_names_run() {
        let source = StubSource::new();
        let report = Orchestrator::new(ThresholdPolicy::default())
            .with_runs(2)
            .run_remote(&urls(&["https://broken.test/"]), &source)
            .await
            .unwrap();

        let error = report.urls[0].error.as_deref().unwrap();
        assert!(error.starts_with("Run 1 of 2"), "{}", error);
    }

    #[tokio::test]
    async fn test_zero_runs_rejected_before_auditing() {
        let source = StubSource::new();
        let err = Orchestrator::new(ThresholdPolicy::default())
            .with_runs(0)
            .run_remote(&urls(&["https://fast.test/"]), &source)
            .await
            .unwrap_err();

        assert!(matches!(err, AuditError::Configuration(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_launch_failure_aborts_before_any_audit() {
        let launcher = BrowserLauncher {
            executable: Some(PathBuf::from("/nonexistent/chrome")),
            ..BrowserLauncher::default()
        };
        let factory_calls = AtomicU32::new(0);

        let err = Orchestrator::new(ThresholdPolicy::default())
            .run_local(&urls(&["https://fast.test/"]), &launcher, |_| {
                factory_calls.fetch_add(1, Ordering::SeqCst);
                StubSource::new()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AuditError::Launch(_)));
        assert_eq!(factory_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_without_api_key_is_configuration_error() {
        let config = Config::from_str(
            r#"
            [audit]
            urls = ["https://example.com"]

            [remote]
            api_key_env = "PAGESPEED_HARNESS_ORCHESTRATOR_UNSET"
            "#,
        )
        .unwrap();

        let err = run(&config).await.unwrap_err();
        assert!(matches!(err, AuditError::Configuration(_)));
    }
}
