//! Single-audit execution
//!
//! The [`AuditRunner`] performs one audit of one URL through a
//! [`MetricSource`], bounded by a timeout. It measures how long the provider
//! took and attaches the report's diagnostic items to the resulting
//! [`MetricSet`]. It never retries: a failed audit is returned to the caller
//! as a [`RunFailure`].
//!
//! # Example
//!
//! ```no_run
//! use pagespeed_harness::adapter::RemoteAuditAdapter;
//! use pagespeed_harness::runner::AuditRunner;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), pagespeed_harness::RunFailure> {
//! let adapter = RemoteAuditAdapter::new("my-api-key");
//! let runner = AuditRunner::new(Duration::from_secs(90));
//! let session = runner.audit("https://example.com", &adapter).await?;
//!
//! println!(
//!     "{}: score {:?} in {}ms",
//!     session.url,
//!     session.metrics.performance_score(),
//!     session.elapsed_ms
//! );
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::adapter::MetricSource;
use crate::config::Provider;
use crate::error::{AuditError, RunFailure};
use crate::metrics::MetricSet;

/// Default bound on a single audit
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything known about one completed audit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSession {
    pub url: String,
    pub provider: Provider,
    pub started_at: DateTime<Utc>,
    /// Wall-clock time spent waiting on the provider
    pub elapsed_ms: u64,
    /// Provider response body; kept in memory only
    #[serde(skip)]
    pub raw_response: Value,
    /// Measurements with diagnostics attached
    pub metrics: MetricSet,
}

/// Runs single audits with a timeout
#[derive(Debug, Clone, Copy)]
pub struct AuditRunner {
    timeout: Duration,
}

impl Default for AuditRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl AuditRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Audit `url` once through `source`
    ///
    /// # Errors
    ///
    /// A [`RunFailure`] wrapping the adapter's error, or
    /// [`AuditError::Timeout`] if the adapter did not answer in time. On
    /// timeout the adapter future is dropped, which cancels the in-flight
    /// request or kills the engine process.
    #[instrument(skip(self, source), fields(provider = source.provider().as_str()))]
    pub async fn audit(
        &self,
        url: &str,
        source: &dyn MetricSource,
    ) -> Result<AuditSession, RunFailure> {
        let started_at = Utc::now();
        let start = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, source.audit(url)).await {
            Ok(result) => result,
            Err(_) => Err(AuditError::Timeout(self.timeout)),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let response = outcome.map_err(|cause| {
            warn!(elapsed_ms, "Audit failed: {}", cause);
            RunFailure {
                url: url.to_string(),
                source: cause,
            }
        })?;

        debug!(
            elapsed_ms,
            diagnostics = response.diagnostics.len(),
            "Audit completed"
        );

        Ok(AuditSession {
            url: url.to_string(),
            provider: source.provider(),
            started_at,
            elapsed_ms,
            raw_response: response.raw,
            metrics: response.metrics.with_diagnostics(response.diagnostics),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterResponse;
    use crate::metrics::MetricName;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedSource {
        delay: Duration,
        result: Result<(), AuditError>,
    }

    #[async_trait]
    impl MetricSource for FixedSource {
        fn provider(&self) -> Provider {
            Provider::Remote
        }

        async fn audit(&self, url: &str) -> Result<AdapterResponse, AuditError> {
            tokio::time::sleep(self.delay).await;
            self.result.clone()?;
            Ok(AdapterResponse {
                metrics: MetricSet::from_values(url, &[(MetricName::Lcp, 1200.0)]).with_score(93.0),
                diagnostics: vec![json!({"numRequests": 12})],
                raw: json!({"lighthouseResult": {}}),
            })
        }
    }

    #[tokio::test]
    async fn test_audit_attaches_diagnostics() {
        let source = FixedSource {
            delay: Duration::ZERO,
            result: Ok(()),
        };

        let session = AuditRunner::default()
            .audit("https://example.com", &source)
            .await
            .unwrap();

        assert_eq!(session.url, "https://example.com");
        assert_eq!(session.provider, Provider::Remote);
        assert_eq!(session.metrics.value(MetricName::Lcp), Some(1200.0));
        assert_eq!(
            session.metrics.primary_diagnostic(),
            Some(&json!({"numRequests": 12}))
        );
        assert_eq!(session.raw_response, json!({"lighthouseResult": {}}));
    }

    #[tokio::test]
    async fn test_adapter_error_becomes_run_failure() {
        let source = FixedSource {
            delay: Duration::ZERO,
            result: Err(AuditError::Network("PageSpeed returned HTTP 500".into())),
        };

        let failure = AuditRunner::default()
            .audit("https://example.com/a", &source)
            .await
            .unwrap_err();

        assert_eq!(failure.url, "https://example.com/a");
        assert!(matches!(failure.source, AuditError::Network(_)));
    }

    #[tokio::test]
    async fn test_slow_adapter_times_out() {
        let source = FixedSource {
            delay: Duration::from_secs(30),
            result: Ok(()),
        };

        let failure = AuditRunner::new(Duration::from_millis(50))
            .audit("https://example.com", &source)
            .await
            .unwrap_err();

        assert_eq!(failure.source, AuditError::Timeout(Duration::from_millis(50)));
    }

    #[test]
    fn test_session_serialization_skips_raw_response() {
        let session = AuditSession {
            url: "https://example.com".to_string(),
            provider: Provider::Local,
            started_at: Utc::now(),
            elapsed_ms: 4200,
            raw_response: json!({"very": "large"}),
            metrics: MetricSet::from_values("https://example.com", &[]),
        };

        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"provider\":\"local\""));
        assert!(!json.contains("very"));
    }
}
