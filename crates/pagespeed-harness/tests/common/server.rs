//! Mock PageSpeed Insights server
//!
//! Serves `/runPagespeed` on an ephemeral port. The audited `url` query
//! parameter picks the behaviour:
//!
//! - contains `error`: HTTP 500
//! - contains `slow`: answers after 5 seconds
//! - contains `partial`: the LCP audit is missing from the result
//! - anything else: a complete result
//!
//! Requests without `key=test-key` get HTTP 403.

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

pub const API_KEY: &str = "test-key";

/// A complete PageSpeed response for `url`
pub fn pagespeed_body(url: &str, lcp: f64) -> Value {
    json!({
        "id": url,
        "lighthouseResult": {
            "lighthouseVersion": "12.2.1",
            "requestedUrl": url,
            "audits": {
                "first-contentful-paint": { "numericValue": 1700.0 },
                "largest-contentful-paint": { "numericValue": lcp },
                "cumulative-layout-shift": { "numericValue": 0.05 },
                "total-blocking-time": { "numericValue": 150.0 },
                "max-potential-fid": { "numericValue": 80.0 },
                "interactive": { "numericValue": 180.0 },
                "diagnostics": {
                    "details": { "type": "debugdata", "items": [{ "numRequests": 42 }] }
                },
                "render-blocking-resources": {
                    "title": "Eliminate render-blocking resources",
                    "details": { "type": "opportunity", "overallSavingsMs": 310 }
                }
            },
            "categories": { "performance": { "score": 0.87 } }
        }
    })
}

async fn run_pagespeed(Query(params): Query<HashMap<String, String>>) -> Response {
    if params.get("key").map(String::as_str) != Some(API_KEY) {
        return (StatusCode::FORBIDDEN, "API key not valid").into_response();
    }
    let url = params.get("url").cloned().unwrap_or_default();

    if url.contains("error") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "backend error").into_response();
    }
    if url.contains("slow") {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    let lcp = if url.contains("heavy") { 2600.0 } else { 1200.0 };
    let mut body = pagespeed_body(&url, lcp);
    if url.contains("partial") {
        if let Some(audits) = body["lighthouseResult"]["audits"].as_object_mut() {
            audits.remove("largest-contentful-paint");
        }
    }
    Json(body).into_response()
}

/// Start the mock server and return its endpoint URL
pub async fn spawn_pagespeed() -> String {
    let router = Router::new().route("/runPagespeed", get(run_pagespeed));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Should bind an ephemeral port");
    let addr = listener.local_addr().expect("Should have a local address");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Mock server failed");
    });

    format!("http://{}/runPagespeed", addr)
}
