//! Remote provider tests against a local mock of the PageSpeed API
//!
//! Run with: cargo test -p pagespeed-harness --test remote_audit

#[path = "common/logging.rs"]
mod logging;
#[path = "common/server.rs"]
mod server;

use pagespeed_harness::adapter::RemoteAuditAdapter;
use pagespeed_harness::metrics::MetricIdMap;
use pagespeed_harness::{AuditError, MetricName, MetricSource, Orchestrator, ThresholdPolicy};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

fn adapter(endpoint: &str) -> RemoteAuditAdapter {
    logging::init();
    RemoteAuditAdapter::new(server::API_KEY).with_endpoint(endpoint)
}

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_remote_adapter_decodes_metrics_and_diagnostics() {
    let endpoint = server::spawn_pagespeed().await;

    let response = adapter(&endpoint)
        .audit("https://site.test/")
        .await
        .expect("Should decode the mock response");

    assert_eq!(response.metrics.url(), "https://site.test/");
    assert_eq!(response.metrics.value(MetricName::Fcp), Some(1700.0));
    assert_eq!(response.metrics.value(MetricName::Lcp), Some(1200.0));
    assert_eq!(response.metrics.value(MetricName::Inp), Some(180.0));
    assert_eq!(response.metrics.performance_score(), Some(87.0));
    assert_eq!(
        response.diagnostics,
        vec![
            json!({"numRequests": 42}),
            json!({
                "id": "render-blocking-resources",
                "title": "Eliminate render-blocking resources",
                "overallSavingsMs": 310
            }),
        ]
    );
}

#[tokio::test]
async fn test_http_500_is_network_error() {
    let endpoint = server::spawn_pagespeed().await;

    let err = adapter(&endpoint)
        .audit("https://error.test/")
        .await
        .unwrap_err();

    assert!(matches!(&err, AuditError::Network(msg) if msg.contains("HTTP 500")));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_wrong_key_is_network_error_without_key_in_message() {
    let endpoint = server::spawn_pagespeed().await;

    let err = RemoteAuditAdapter::new("wrong-secret-key")
        .with_endpoint(&endpoint)
        .audit("https://site.test/")
        .await
        .unwrap_err();

    assert!(matches!(&err, AuditError::Network(msg) if msg.contains("HTTP 403")));
    assert!(!err.to_string().contains("wrong-secret-key"));
}

#[tokio::test]
async fn test_missing_audit_is_parse_error_naming_id() {
    let endpoint = server::spawn_pagespeed().await;

    let err = adapter(&endpoint)
        .audit("https://partial.test/")
        .await
        .unwrap_err();

    assert!(matches!(&err, AuditError::Parse(msg) if msg.contains("largest-contentful-paint")));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    // Port 9 (discard) is closed on test machines
    let err = adapter("http://127.0.0.1:9/runPagespeed")
        .audit("https://site.test/")
        .await
        .unwrap_err();

    assert!(matches!(err, AuditError::Network(_)));
}

#[tokio::test]
async fn test_orchestrator_continues_after_http_500() {
    let endpoint = server::spawn_pagespeed().await;

    let report = Orchestrator::new(ThresholdPolicy::default())
        .run_remote(
            &urls(&["https://error.test/", "https://site.test/"]),
            &adapter(&endpoint),
        )
        .await
        .expect("HTTP 500 must not abort the run");

    assert_eq!(report.urls.len(), 2);
    assert!(!report.urls[0].passed);
    assert!(report.urls[0].error.as_deref().unwrap().contains("HTTP 500"));
    assert!(report.urls[1].passed);
    assert_eq!(report.urls[1].verdicts.len(), 6);
    assert!(!report.passed);
}

#[tokio::test]
async fn test_orchestrator_timeout_then_next_url() {
    let endpoint = server::spawn_pagespeed().await;

    let report = Orchestrator::new(ThresholdPolicy::default())
        .with_timeout(Duration::from_millis(500))
        .with_concurrency(1)
        .run_remote(
            &urls(&["https://slow.test/", "https://site.test/"]),
            &adapter(&endpoint),
        )
        .await
        .unwrap();

    assert!(report.urls[0]
        .error
        .as_deref()
        .unwrap()
        .contains("timed out after 500ms"));
    assert!(report.urls[1].passed);
}

#[tokio::test]
async fn test_failing_threshold_message_quotes_diagnostics() {
    let endpoint = server::spawn_pagespeed().await;

    let report = Orchestrator::new(ThresholdPolicy::default())
        .run_remote(&urls(&["https://heavy.test/"]), &adapter(&endpoint))
        .await
        .unwrap();

    let url = &report.urls[0];
    let failed: Vec<_> = url.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(
        failed[0].message,
        "LCP for https://heavy.test/ is 2600. Expected < 2500. Diagnostic Info: {\"numRequests\":42}"
    );
}

#[tokio::test]
async fn test_policy_without_lcp_ignores_missing_lcp_audit() {
    let endpoint = server::spawn_pagespeed().await;
    let policy = ThresholdPolicy::new().with(MetricName::Fcp, 1800.0);
    let adapter = adapter(&endpoint)
        .with_metric_ids(MetricIdMap::default().only([MetricName::Fcp]));

    let report = Orchestrator::new(policy)
        .run_remote(&urls(&["https://partial.test/"]), &adapter)
        .await
        .unwrap();

    let url = &report.urls[0];
    assert_eq!(url.error, None);
    assert_eq!(url.verdicts.len(), 1);
    assert!(url.passed);
}
