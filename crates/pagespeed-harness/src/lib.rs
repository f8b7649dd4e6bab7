//! Page-load audit harness
//!
//! Audits web pages with Lighthouse, either remotely through the PageSpeed
//! Insights API or locally by driving a headless Chrome, and checks the
//! resulting Web Vitals against a threshold policy.
//!
//! # Features
//!
//! - **Two providers**: PageSpeed Insights (HTTP) or the Lighthouse CLI
//!   against a locally launched browser, behind one [`MetricSource`] trait
//! - **Multi-run averaging**: audit a URL N times and average the score;
//!   one failed run fails the series
//! - **Threshold verdicts**: one pass/fail [`Verdict`] per metric, with the
//!   report's first diagnostic item quoted on failure
//! - **Failure scoping**: network, timeout and parse errors are recorded per
//!   URL, configuration and launch errors end the run
//! - **Output formats**: console, JSON and pretty JSON reports
//!
//! # Example
//!
//! ```no_run
//! use pagespeed_harness::{orchestrator, Config, OutputFormat, Reporter};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_file("pagespeed.toml")?;
//! let report = orchestrator::run(&config).await?;
//!
//! Reporter::new(OutputFormat::Console).report(&report)?;
//! Reporter::new(OutputFormat::Json).write_to_file(&report, "pagespeed-report.json")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [audit]
//! provider = "remote"
//! urls = ["https://example.com", "https://example.com/pricing"]
//! runs = 3
//! timeout_ms = 120000
//!
//! [remote]
//! api_key_env = "PAGE_SPEED_API_KEY"
//! strategy = "mobile"
//!
//! [[thresholds]]
//! metric = "LCP"
//! threshold = 2500.0
//!
//! [[thresholds]]
//! metric = "CLS"
//! threshold = 0.1
//! comparator = "le"
//! ```

pub mod adapter;
pub mod aggregate;
pub mod browser;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod metrics;
pub mod orchestrator;
pub mod reporter;
pub mod runner;
pub mod stats;

// Re-export main types for convenience
pub use adapter::{AdapterResponse, MetricSource};
pub use aggregate::{AggregatedScore, MultiRunAggregator};
pub use browser::{BrowserLauncher, BrowserSession, SessionState};
pub use config::{Config, Provider};
pub use error::{AggregationFailure, AuditError, RunFailure};
pub use evaluate::{evaluate, Comparator, ThresholdPolicy, Verdict};
pub use metrics::{MetricName, MetricSet};
pub use orchestrator::{Orchestrator, RunReport, UrlReport};
pub use reporter::{OutputFormat, Reporter};
pub use runner::{AuditRunner, AuditSession};
