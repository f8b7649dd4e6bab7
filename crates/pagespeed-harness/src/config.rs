//! Configuration parsing for audit runs
//!
//! This module provides TOML-based configuration for choosing the audit
//! provider, the URLs to audit, how many runs to average, and the threshold
//! policy the results are checked against.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AuditError;
use crate::evaluate::{Comparator, ThresholdPolicy};
use crate::metrics::{MetricIdMap, MetricName};

/// PageSpeed Insights v5 audit endpoint
pub const PAGESPEED_ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";

/// Environment variable holding the PageSpeed API key
pub const DEFAULT_API_KEY_ENV: &str = "PAGE_SPEED_API_KEY";

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// What to audit and how often
    pub audit: AuditConfig,
    /// Remote provider settings
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Local provider settings
    #[serde(default)]
    pub local: LocalConfig,
    /// Threshold policy; the default Web Vitals policy when empty
    #[serde(default)]
    pub thresholds: Vec<ThresholdEntry>,
    /// Audit id overrides keyed by metric name (e.g. `INP = "interactive"`)
    ///
    /// Only metrics named by the threshold policy are decoded from a report.
    #[serde(default)]
    pub metric_ids: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - Required fields are missing
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pagespeed_harness::config::Config;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = Config::from_file("pagespeed.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use pagespeed_harness::config::{Config, Provider};
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let toml = r#"
    ///     [audit]
    ///     provider = "remote"
    ///     urls = ["https://example.com"]
    /// "#;
    /// let config = Config::from_str(toml)?;
    /// assert_eq!(config.audit.provider, Provider::Remote);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<(), AuditError> {
        if self.audit.urls.is_empty() {
            return Err(AuditError::Configuration("no URLs to audit".to_string()));
        }
        if self.audit.runs == 0 {
            return Err(AuditError::Configuration("runs must be at least 1".to_string()));
        }
        if self.audit.timeout_ms == 0 {
            return Err(AuditError::Configuration("timeout_ms must be positive".to_string()));
        }

        let mut seen = HashSet::new();
        for entry in &self.thresholds {
            let metric = MetricName::parse(&entry.metric)?;
            if !seen.insert(metric) {
                return Err(AuditError::Configuration(format!(
                    "threshold for {} declared more than once",
                    metric
                )));
            }
        }
        self.metric_ids()?;
        Ok(())
    }

    /// The threshold policy in declaration order
    pub fn threshold_policy(&self) -> Result<ThresholdPolicy, AuditError> {
        if self.thresholds.is_empty() {
            return Ok(ThresholdPolicy::default());
        }

        self.thresholds
            .iter()
            .try_fold(ThresholdPolicy::new(), |policy, entry| {
                let metric = MetricName::parse(&entry.metric)?;
                let comparator = entry
                    .comparator
                    .unwrap_or_else(|| Comparator::default_for(metric));
                Ok(policy.with_comparator(metric, entry.threshold, comparator))
            })
    }

    /// Default audit ids with the configured overrides applied
    pub fn metric_ids(&self) -> Result<MetricIdMap, AuditError> {
        self.metric_ids
            .iter()
            .try_fold(MetricIdMap::default(), |ids, (metric, id)| {
                Ok(ids.with_id(MetricName::parse(metric)?, id.clone()))
            })
    }
}

/// Which provider produces the measurements
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// PageSpeed Insights API
    #[default]
    Remote,
    /// Lighthouse CLI against a locally launched Chrome
    Local,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Remote => "remote",
            Provider::Local => "local",
        }
    }
}

/// Core audit parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub provider: Provider,
    /// URLs to audit, in report order
    pub urls: Vec<String>,
    /// Audits per URL; the score is averaged when greater than 1 (default: 1)
    #[serde(default = "default_runs")]
    pub runs: u32,
    /// Bound on a single audit invocation in milliseconds (default: 120000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Remote audits in flight at once (default: 4, local audits are always sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl AuditConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_runs() -> u32 {
    1
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_concurrency() -> usize {
    4
}

/// PageSpeed Insights settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// `mobile` or `desktop`; the API default when unset
    #[serde(default)]
    pub strategy: Option<Strategy>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            strategy: None,
        }
    }
}

fn default_endpoint() -> String {
    PAGESPEED_ENDPOINT.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

/// Device emulation requested from PageSpeed Insights
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Mobile,
    Desktop,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Mobile => "mobile",
            Strategy::Desktop => "desktop",
        }
    }
}

/// Local Lighthouse + Chrome settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Lighthouse CLI executable (default: `lighthouse` on PATH)
    #[serde(default = "default_lighthouse_bin")]
    pub lighthouse_bin: PathBuf,
    /// Arguments placed before the URL (e.g. the CLI script when the bin is `node`)
    #[serde(default)]
    pub lighthouse_args: Vec<String>,
    /// Chrome executable; auto-detected when unset
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Extra Chrome command-line arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            lighthouse_bin: default_lighthouse_bin(),
            lighthouse_args: Vec::new(),
            chrome_executable: None,
            headless: true,
            extra_args: Vec::new(),
        }
    }
}

fn default_lighthouse_bin() -> PathBuf {
    PathBuf::from("lighthouse")
}

fn default_headless() -> bool {
    true
}

/// One `[[thresholds]]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdEntry {
    pub metric: String,
    pub threshold: f64,
    /// Falls back to the metric's default comparator
    #[serde(default)]
    pub comparator: Option<Comparator>,
}
