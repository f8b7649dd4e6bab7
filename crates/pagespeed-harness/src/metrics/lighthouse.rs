//! Strict decoding of Lighthouse result JSON
//!
//! Both providers hand back a Lighthouse result ("LHR"): PageSpeed Insights
//! nests it under `lighthouseResult`, the local CLI prints it as-is. This
//! module decodes the LHR into typed structs once, at the adapter boundary,
//! and turns it into a [`MetricSet`]. Any audit id the [`MetricIdMap`] asks
//! for must be present with a numeric `numericValue`, otherwise decoding
//! fails with [`AuditError::Parse`] naming the id.
//!
//! # Example
//!
//! ```
//! use pagespeed_harness::metrics::{LighthouseReport, MetricIdMap, MetricName};
//! use serde_json::json;
//!
//! let lhr = json!({
//!     "audits": {
//!         "first-contentful-paint": { "numericValue": 1200.0 },
//!         "largest-contentful-paint": { "numericValue": 2100.0 },
//!         "cumulative-layout-shift": { "numericValue": 0.02 },
//!         "total-blocking-time": { "numericValue": 90.0 },
//!         "max-potential-fid": { "numericValue": 60.0 },
//!         "interactive": { "numericValue": 150.0 }
//!     },
//!     "categories": { "performance": { "score": 0.93 } }
//! });
//!
//! let report = LighthouseReport::from_lhr(&lhr).unwrap();
//! let set = report.metric_set("https://example.com", &MetricIdMap::default()).unwrap();
//! assert_eq!(set.value(MetricName::Lcp), Some(2100.0));
//! assert_eq!(set.performance_score(), Some(93.0));
//! ```

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::{MetricIdMap, MetricSet, MetricValue};
use crate::error::AuditError;

/// Audit id whose `details.items` carries page-level diagnostics
const DIAGNOSTICS_AUDIT: &str = "diagnostics";

/// The subset of a Lighthouse result the harness relies on
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseReport {
    #[serde(default)]
    pub lighthouse_version: Option<String>,
    #[serde(default)]
    pub requested_url: Option<String>,
    #[serde(default)]
    pub runtime_error: Option<RuntimeError>,
    pub audits: BTreeMap<String, AuditEntry>,
    #[serde(default)]
    pub categories: Categories,
}

/// Set by Lighthouse when the page could not be audited at all
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeError {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Categories {
    #[serde(default)]
    pub performance: Option<Category>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    /// 0.0 - 1.0, null when the category errored
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub numeric_value: Option<f64>,
    #[serde(default)]
    pub details: Option<Value>,
}

impl AuditEntry {
    fn details_type(&self) -> Option<&str> {
        self.details.as_ref()?.get("type")?.as_str()
    }
}

impl LighthouseReport {
    /// Decode a bare LHR (local CLI output)
    pub fn from_lhr(value: &Value) -> Result<Self, AuditError> {
        let report: LighthouseReport = serde_json::from_value(value.clone())
            .map_err(|e| AuditError::Parse(format!("invalid Lighthouse result: {}", e)))?;

        if let Some(err) = &report.runtime_error {
            return Err(AuditError::Parse(format!(
                "Lighthouse runtime error {}: {}",
                err.code, err.message
            )));
        }

        Ok(report)
    }

    /// Decode a PageSpeed Insights v5 response body
    pub fn from_pagespeed(value: &Value) -> Result<Self, AuditError> {
        let lhr = value
            .get("lighthouseResult")
            .ok_or_else(|| AuditError::Parse("response has no 'lighthouseResult'".to_string()))?;
        Self::from_lhr(lhr)
    }

    /// Build the canonical metric set for `url`
    ///
    /// Every metric in `ids` is required. Diagnostics are left empty; the
    /// audit runner attaches them.
    pub fn metric_set(&self, url: &str, ids: &MetricIdMap) -> Result<MetricSet, AuditError> {
        let mut values = BTreeMap::new();

        for (metric, id) in ids.iter() {
            let audit = self.audits.get(id).ok_or_else(|| {
                AuditError::Parse(format!("audit '{}' ({}) missing from response", id, metric))
            })?;
            let value = audit.numeric_value.ok_or_else(|| {
                AuditError::Parse(format!("audit '{}' ({}) has no numericValue", id, metric))
            })?;
            values.insert(
                metric,
                MetricValue {
                    value,
                    detail: audit.details.clone(),
                },
            );
        }

        Ok(MetricSet::new(url, values, self.performance_score()))
    }

    /// Performance category score scaled to 0-100
    pub fn performance_score(&self) -> Option<f64> {
        self.categories
            .performance
            .as_ref()
            .and_then(|c| c.score)
            .map(|s| s * 100.0)
    }

    /// Diagnostic items followed by opportunity summaries
    pub fn diagnostic_items(&self) -> Vec<Value> {
        let mut items: Vec<Value> = self
            .audits
            .get(DIAGNOSTICS_AUDIT)
            .and_then(|a| a.details.as_ref())
            .and_then(|d| d.get("items"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for (id, audit) in &self.audits {
            if audit.details_type() != Some("opportunity") {
                continue;
            }
            let savings = audit
                .details
                .as_ref()
                .and_then(|d| d.get("overallSavingsMs"))
                .cloned()
                .unwrap_or(Value::Null);
            items.push(json!({
                "id": id,
                "title": audit.title,
                "overallSavingsMs": savings,
            }));
        }

        items
    }
}
