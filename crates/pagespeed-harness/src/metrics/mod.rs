//! Canonical page-load metrics
//!
//! Every provider response is normalized into a [`MetricSet`] keyed by
//! [`MetricName`]. Providers name their audits differently (and some of the
//! mappings are approximations, e.g. `max-potential-fid` standing in for FID),
//! so the provider audit id for each metric lives in a configurable
//! [`MetricIdMap`].
//!
//! # Example
//!
//! ```
//! use pagespeed_harness::metrics::{MetricName, MetricSet};
//!
//! let set = MetricSet::from_values(
//!     "https://example.com",
//!     &[(MetricName::Fcp, 1700.0), (MetricName::Cls, 0.05)],
//! );
//! assert_eq!(set.value(MetricName::Fcp), Some(1700.0));
//! assert_eq!(set.value(MetricName::Lcp), None);
//! ```

pub mod lighthouse;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::AuditError;

pub use lighthouse::LighthouseReport;

/// Page-load metrics understood by the evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricName {
    /// First Contentful Paint (ms)
    #[serde(rename = "FCP")]
    Fcp,
    /// Largest Contentful Paint (ms)
    #[serde(rename = "LCP")]
    Lcp,
    /// Cumulative Layout Shift (unitless)
    #[serde(rename = "CLS")]
    Cls,
    /// Total Blocking Time (ms)
    #[serde(rename = "TBT")]
    Tbt,
    /// First Input Delay (ms)
    #[serde(rename = "FID")]
    Fid,
    /// Interaction to Next Paint (ms)
    #[serde(rename = "INP")]
    Inp,
}

impl MetricName {
    pub const ALL: [MetricName; 6] = [
        MetricName::Fcp,
        MetricName::Lcp,
        MetricName::Cls,
        MetricName::Tbt,
        MetricName::Fid,
        MetricName::Inp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::Fcp => "FCP",
            MetricName::Lcp => "LCP",
            MetricName::Cls => "CLS",
            MetricName::Tbt => "TBT",
            MetricName::Fid => "FID",
            MetricName::Inp => "INP",
        }
    }

    /// Unit suffix for display ("" for CLS)
    pub fn unit(&self) -> &'static str {
        match self {
            MetricName::Cls => "",
            _ => "ms",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AuditError> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FCP" => Ok(MetricName::Fcp),
            "LCP" => Ok(MetricName::Lcp),
            "CLS" => Ok(MetricName::Cls),
            "TBT" => Ok(MetricName::Tbt),
            "FID" => Ok(MetricName::Fid),
            "INP" => Ok(MetricName::Inp),
            other => Err(AuditError::Configuration(format!(
                "unknown metric '{}'. expected one of: FCP | LCP | CLS | TBT | FID | INP",
                other
            ))),
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider audit id for each metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricIdMap {
    ids: BTreeMap<MetricName, String>,
}

impl MetricIdMap {
    /// Override the audit id used for `metric`
    pub fn with_id(mut self, metric: MetricName, id: impl Into<String>) -> Self {
        self.ids.insert(metric, id.into());
        self
    }

    pub fn id(&self, metric: MetricName) -> &str {
        self.ids
            .get(&metric)
            .map(String::as_str)
            .unwrap_or_else(|| Self::default_id(metric))
    }

    /// Keep only `metrics`; audits for the others are not decoded
    pub fn only(mut self, metrics: impl IntoIterator<Item = MetricName>) -> Self {
        let keep: BTreeSet<MetricName> = metrics.into_iter().collect();
        self.ids.retain(|metric, _| keep.contains(metric));
        self
    }

    /// Metrics to decode, with their audit ids
    pub fn iter(&self) -> impl Iterator<Item = (MetricName, &str)> + '_ {
        self.ids.iter().map(|(m, id)| (*m, id.as_str()))
    }

    fn default_id(metric: MetricName) -> &'static str {
        match metric {
            MetricName::Fcp => "first-contentful-paint",
            MetricName::Lcp => "largest-contentful-paint",
            MetricName::Cls => "cumulative-layout-shift",
            MetricName::Tbt => "total-blocking-time",
            MetricName::Fid => "max-potential-fid",
            MetricName::Inp => "interactive",
        }
    }
}

impl Default for MetricIdMap {
    fn default() -> Self {
        Self {
            ids: MetricName::ALL
                .iter()
                .map(|m| (*m, Self::default_id(*m).to_string()))
                .collect(),
        }
    }
}

/// One measured value plus the provider's detail block for that audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl MetricValue {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            detail: None,
        }
    }
}

/// Normalized result of one audit
///
/// Fields are private: a set is built once by an adapter and only ever
/// replaced, never edited. [`MetricSet::with_diagnostics`] consumes the set
/// and returns a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    url: String,
    values: BTreeMap<MetricName, MetricValue>,
    performance_score: Option<f64>,
    #[serde(default)]
    diagnostics: Vec<Value>,
}

impl MetricSet {
    /// `performance_score` is on the 0-100 scale
    pub fn new(
        url: impl Into<String>,
        values: BTreeMap<MetricName, MetricValue>,
        performance_score: Option<f64>,
    ) -> Self {
        Self {
            url: url.into(),
            values,
            performance_score,
            diagnostics: Vec::new(),
        }
    }

    pub fn from_values(url: impl Into<String>, values: &[(MetricName, f64)]) -> Self {
        Self::new(
            url,
            values
                .iter()
                .map(|(name, v)| (*name, MetricValue::new(*v)))
                .collect(),
            None,
        )
    }

    pub fn with_score(self, score: f64) -> Self {
        Self {
            performance_score: Some(score),
            ..self
        }
    }

    pub fn with_diagnostics(self, diagnostics: Vec<Value>) -> Self {
        Self {
            diagnostics,
            ..self
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn value(&self, metric: MetricName) -> Option<f64> {
        self.values.get(&metric).map(|v| v.value)
    }

    pub fn detail(&self, metric: MetricName) -> Option<&Value> {
        self.values.get(&metric).and_then(|v| v.detail.as_ref())
    }

    pub fn values(&self) -> impl Iterator<Item = (MetricName, &MetricValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    pub fn performance_score(&self) -> Option<f64> {
        self.performance_score
    }

    pub fn diagnostics(&self) -> &[Value] {
        &self.diagnostics
    }

    /// The item quoted in failing verdict messages
    pub fn primary_diagnostic(&self) -> Option<&Value> {
        self.diagnostics.first()
    }

    /// Per-metric arithmetic mean over several runs of the same URL
    ///
    /// A metric is kept only if every set reports it. Diagnostics and
    /// per-metric details come from the first set. Returns `None` for an
    /// empty slice.
    pub fn mean_of(sets: &[MetricSet]) -> Option<MetricSet> {
        let first = sets.first()?;
        let n = sets.len() as f64;

        let values = first
            .values
            .iter()
            .filter_map(|(name, first_value)| {
                let sum = sets
                    .iter()
                    .map(|s| s.value(*name))
                    .sum::<Option<f64>>()?;
                Some((
                    *name,
                    MetricValue {
                        value: sum / n,
                        detail: first_value.detail.clone(),
                    },
                ))
            })
            .collect();

        let performance_score = sets
            .iter()
            .map(|s| s.performance_score)
            .sum::<Option<f64>>()
            .map(|sum| sum / n);

        Some(MetricSet {
            url: first.url.clone(),
            values,
            performance_score,
            diagnostics: first.diagnostics.clone(),
        })
    }
}
