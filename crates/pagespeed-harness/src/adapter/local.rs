//! Local Lighthouse adapter
//!
//! Runs the Lighthouse CLI against the Chrome instance of a Ready
//! [`BrowserSession`](crate::browser::BrowserSession). Only the performance
//! category is audited. The CLI prints its result JSON to stdout, which is
//! decoded with the same schema the remote adapter uses.

use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{AdapterResponse, MetricSource};
use crate::browser::SessionEndpoint;
use crate::config::{LocalConfig, Provider};
use crate::error::AuditError;
use crate::metrics::{LighthouseReport, MetricIdMap};

/// Longest stderr tail kept in an error message
const STDERR_TAIL: usize = 500;

/// Lighthouse CLI invocation settings
#[derive(Debug, Clone)]
pub struct LighthouseCli {
    bin: PathBuf,
    /// Placed before the URL, e.g. the script path when `bin` is `node`
    prefix_args: Vec<String>,
}

impl LighthouseCli {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            prefix_args: Vec::new(),
        }
    }

    pub fn with_prefix_args(mut self, args: Vec<String>) -> Self {
        self.prefix_args = args;
        self
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    /// Arguments for auditing `url` through the browser on `port`
    pub fn args(&self, url: &str, port: u16) -> Vec<String> {
        let mut args = self.prefix_args.clone();
        args.extend([
            url.to_string(),
            format!("--port={}", port),
            "--only-categories=performance".to_string(),
            "--output=json".to_string(),
            "--output-path=stdout".to_string(),
            "--quiet".to_string(),
        ]);
        args
    }
}

impl Default for LighthouseCli {
    fn default() -> Self {
        Self::new("lighthouse")
    }
}

impl From<&LocalConfig> for LighthouseCli {
    fn from(local: &LocalConfig) -> Self {
        Self::new(&local.lighthouse_bin).with_prefix_args(local.lighthouse_args.clone())
    }
}

/// Audits URLs with Lighthouse through a locally launched browser
#[derive(Debug, Clone)]
pub struct LocalBrowserAuditAdapter {
    engine: LighthouseCli,
    endpoint: SessionEndpoint,
    metric_ids: MetricIdMap,
}

impl LocalBrowserAuditAdapter {
    pub fn new(engine: LighthouseCli, endpoint: SessionEndpoint) -> Self {
        Self {
            engine,
            endpoint,
            metric_ids: MetricIdMap::default(),
        }
    }

    pub fn with_metric_ids(mut self, metric_ids: MetricIdMap) -> Self {
        self.metric_ids = metric_ids;
        self
    }

    pub fn endpoint(&self) -> &SessionEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl MetricSource for LocalBrowserAuditAdapter {
    fn provider(&self) -> Provider {
        Provider::Local
    }

    #[instrument(skip(self), fields(port = self.endpoint.port))]
    async fn audit(&self, url: &str) -> Result<AdapterResponse, AuditError> {
        debug!("Running Lighthouse via {}", self.engine.bin().display());

        // kill_on_drop: a timed-out or cancelled audit must not leave Lighthouse running
        let output = Command::new(self.engine.bin())
            .args(self.engine.args(url, self.endpoint.port))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => AuditError::Configuration(
                    format!("cannot run Lighthouse at {}: {}", self.engine.bin().display(), e),
                ),
                _ => AuditError::Network(format!("failed to run Lighthouse: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .chars()
                .rev()
                .take(STDERR_TAIL)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            return Err(AuditError::Network(format!(
                "Lighthouse exited with {}: {}",
                output.status,
                tail.trim()
            )));
        }

        let raw: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| AuditError::Parse(format!("Lighthouse output is not JSON: {}", e)))?;
        let report = LighthouseReport::from_lhr(&raw)?;

        AdapterResponse::from_report(url, raw, &report, &self.metric_ids)
    }
}
