//! Metric source adapters
//!
//! An adapter runs one audit of one URL against a provider and normalizes
//! the provider's answer into a [`MetricSet`]. Two providers exist:
//!
//! - [`RemoteAuditAdapter`]: PageSpeed Insights over HTTP
//! - [`LocalBrowserAuditAdapter`]: the Lighthouse CLI driving a Chrome
//!   instance owned by a [`BrowserSession`](crate::browser::BrowserSession)
//!
//! Adapters make exactly one attempt per call. Retry and run-count policy
//! belong to the caller ([`AuditRunner`](crate::runner::AuditRunner) and the
//! orchestrator).

pub mod local;
pub mod remote;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Provider;
use crate::error::AuditError;
use crate::metrics::{LighthouseReport, MetricIdMap, MetricSet};

pub use local::{LighthouseCli, LocalBrowserAuditAdapter};
pub use remote::RemoteAuditAdapter;

/// A decoded provider answer
#[derive(Debug, Clone)]
pub struct AdapterResponse {
    /// Metrics without diagnostics attached
    pub metrics: MetricSet,
    /// Diagnostic and opportunity items from the report
    pub diagnostics: Vec<Value>,
    /// The provider's response body as received
    pub raw: Value,
}

impl AdapterResponse {
    /// Build a response from an already decoded report
    pub fn from_report(
        url: &str,
        raw: Value,
        report: &LighthouseReport,
        metric_ids: &MetricIdMap,
    ) -> Result<Self, AuditError> {
        Ok(Self {
            metrics: report.metric_set(url, metric_ids)?,
            diagnostics: report.diagnostic_items(),
            raw,
        })
    }
}

/// A provider of page-load measurements
#[async_trait]
pub trait MetricSource: Send + Sync {
    fn provider(&self) -> Provider;

    /// Audit `url` once
    async fn audit(&self, url: &str) -> Result<AdapterResponse, AuditError>;
}
