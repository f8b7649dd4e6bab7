//! PageSpeed Insights adapter

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use tracing::{debug, instrument};

use super::{AdapterResponse, MetricSource};
use crate::config::{Provider, RemoteConfig, Strategy, PAGESPEED_ENDPOINT};
use crate::error::AuditError;
use crate::metrics::{LighthouseReport, MetricIdMap};

/// Longest slice of an error body kept in a NetworkError message
const ERROR_BODY_LIMIT: usize = 300;

/// Audits URLs through the PageSpeed Insights v5 API
///
/// One GET per [`audit`](MetricSource::audit) call, no retries. The API key
/// is never logged and is stripped from transport errors.
#[derive(Clone)]
pub struct RemoteAuditAdapter {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    strategy: Option<Strategy>,
    metric_ids: MetricIdMap,
}

impl RemoteAuditAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: PAGESPEED_ENDPOINT.to_string(),
            api_key: api_key.into(),
            strategy: None,
            metric_ids: MetricIdMap::default(),
        }
    }

    /// Build from configuration, reading the API key from the environment
    ///
    /// # Errors
    ///
    /// [`AuditError::Configuration`] if the key variable is unset or empty
    pub fn from_config(remote: &RemoteConfig, metric_ids: MetricIdMap) -> Result<Self, AuditError> {
        Self::from_config_with_key(remote, metric_ids, std::env::var(&remote.api_key_env).ok())
    }

    fn from_config_with_key(
        remote: &RemoteConfig,
        metric_ids: MetricIdMap,
        api_key: Option<String>,
    ) -> Result<Self, AuditError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AuditError::Configuration(format!(
                    "PageSpeed API key not set (expected in ${})",
                    remote.api_key_env
                ))
            })?;

        let adapter = Self::new(api_key)
            .with_endpoint(remote.endpoint.clone())
            .with_metric_ids(metric_ids);
        Ok(match remote.strategy {
            Some(strategy) => adapter.with_strategy(strategy),
            None => adapter,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_metric_ids(mut self, metric_ids: MetricIdMap) -> Self {
        self.metric_ids = metric_ids;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn query<'a>(&'a self, url: &'a str) -> Vec<(&'static str, &'a str)> {
        let mut params = vec![("url", url), ("key", self.api_key.as_str())];
        if let Some(strategy) = self.strategy {
            params.push(("strategy", strategy.as_str()));
        }
        params
    }
}

impl fmt::Debug for RemoteAuditAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAuditAdapter")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("strategy", &self.strategy)
            .finish()
    }
}

fn transport_error(e: reqwest::Error) -> AuditError {
    let e = e.without_url();
    if e.is_decode() {
        AuditError::Parse(format!("response body is not valid JSON: {}", e))
    } else {
        AuditError::Network(e.to_string())
    }
}

#[async_trait]
impl MetricSource for RemoteAuditAdapter {
    fn provider(&self) -> Provider {
        Provider::Remote
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn audit(&self, url: &str) -> Result<AdapterResponse, AuditError> {
        debug!("Requesting PageSpeed audit");

        let resp = self
            .http
            .get(&self.endpoint)
            .query(&self.query(url))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(AuditError::Network(format!(
                "PageSpeed returned HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let raw: Value = resp.json().await.map_err(transport_error)?;
        let report = LighthouseReport::from_pagespeed(&raw)?;
        debug!(
            lighthouse_version = report.lighthouse_version.as_deref().unwrap_or("unknown"),
            "PageSpeed audit decoded"
        );

        AdapterResponse::from_report(url, raw, &report, &self.metric_ids)
    }
}
