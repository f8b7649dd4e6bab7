//! Threshold evaluation
//!
//! [`evaluate`] compares a [`MetricSet`] with a [`ThresholdPolicy`] and
//! returns one [`Verdict`] per policy entry, in policy order. It is a pure
//! function and never fails: a metric over its bound, or one the set does
//! not contain, is reported as `passed = false`.
//!
//! # Example
//!
//! ```
//! use pagespeed_harness::evaluate::{all_passed, evaluate, ThresholdPolicy};
//! use pagespeed_harness::metrics::{MetricName, MetricSet};
//!
//! let set = MetricSet::from_values("https://example.com", &[(MetricName::Lcp, 2600.0)]);
//! let policy = ThresholdPolicy::new().with(MetricName::Lcp, 2500.0);
//!
//! let verdicts = evaluate(&set, &policy);
//! assert!(!all_passed(&verdicts));
//! assert_eq!(
//!     verdicts[0].message,
//!     "LCP for https://example.com is 2600. Expected < 2500. No diagnostic information available."
//! );
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::metrics::{MetricName, MetricSet};

/// How an actual value is compared to its threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// actual < threshold
    Lt,
    /// actual <= threshold
    Le,
}

impl Comparator {
    /// Comparator used when the policy does not name one
    pub fn default_for(metric: MetricName) -> Self {
        match metric {
            MetricName::Cls | MetricName::Inp => Comparator::Le,
            MetricName::Fcp | MetricName::Lcp | MetricName::Tbt | MetricName::Fid => {
                Comparator::Lt
            }
        }
    }

    pub fn holds(&self, actual: f64, threshold: f64) -> bool {
        match self {
            Comparator::Lt => actual < threshold,
            Comparator::Le => actual <= threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Lt => "<",
            Comparator::Le => "<=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub metric: MetricName,
    pub threshold: f64,
    pub comparator: Comparator,
}

/// Ordered metric bounds
///
/// Declaration order is evaluation order. Adding a metric that is already
/// present replaces its bound in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    entries: Vec<Threshold>,
}

impl ThresholdPolicy {
    /// An empty policy
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a bound using the metric's default comparator
    pub fn with(self, metric: MetricName, threshold: f64) -> Self {
        self.with_comparator(metric, threshold, Comparator::default_for(metric))
    }

    pub fn with_comparator(
        mut self,
        metric: MetricName,
        threshold: f64,
        comparator: Comparator,
    ) -> Self {
        let entry = Threshold {
            metric,
            threshold,
            comparator,
        };
        match self.entries.iter_mut().find(|t| t.metric == metric) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    pub fn entries(&self) -> &[Threshold] {
        &self.entries
    }

    pub fn get(&self, metric: MetricName) -> Option<&Threshold> {
        self.entries.iter().find(|t| t.metric == metric)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ThresholdPolicy {
    /// Good-experience bounds for each Web Vital
    fn default() -> Self {
        Self::new()
            .with(MetricName::Fcp, 1800.0)
            .with(MetricName::Lcp, 2500.0)
            .with(MetricName::Cls, 0.1)
            .with(MetricName::Tbt, 200.0)
            .with(MetricName::Fid, 100.0)
            .with(MetricName::Inp, 200.0)
    }
}

/// Pass/fail outcome for one metric of one URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub metric: MetricName,
    pub url: String,
    /// `None` when the metric set did not contain the metric
    pub actual: Option<f64>,
    pub threshold: f64,
    pub comparator: Comparator,
    pub passed: bool,
    pub message: String,
}

/// Evaluate `set` against every entry of `policy`, in policy order
pub fn evaluate(set: &MetricSet, policy: &ThresholdPolicy) -> Vec<Verdict> {
    let diagnostic = match set.primary_diagnostic() {
        Some(item) => format!(" Diagnostic Info: {}", item),
        None => " No diagnostic information available.".to_string(),
    };

    policy
        .entries()
        .iter()
        .map(|t| {
            let actual = set.value(t.metric);
            let passed = actual.is_some_and(|v| t.comparator.holds(v, t.threshold));
            let observed = match actual {
                Some(v) => v.to_string(),
                None => "unavailable".to_string(),
            };
            let message = format!(
                "{} for {} is {}. Expected {} {}.{}",
                t.metric,
                set.url(),
                observed,
                t.comparator,
                t.threshold,
                diagnostic
            );

            Verdict {
                metric: t.metric,
                url: set.url().to_string(),
                actual,
                threshold: t.threshold,
                comparator: t.comparator,
                passed,
                message,
            }
        })
        .collect()
}

/// A URL passes only if every verdict passed
pub fn all_passed(verdicts: &[Verdict]) -> bool {
    verdicts.iter().all(|v| v.passed)
}
