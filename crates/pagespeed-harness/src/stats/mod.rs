//! Statistical summaries of multi-run audits
//!
//! # Examples
//!
//! ```
//! use pagespeed_harness::stats::ScoreSummary;
//!
//! let scores = vec![91.0, 87.0, 89.0, 93.0, 90.0];
//! let summary = ScoreSummary::from_samples(&scores).unwrap();
//! println!("Median: {}, spread: {:.2}%", summary.median, summary.coefficient_of_variation() * 100.0);
//! ```

pub mod percentiles;

pub use percentiles::{percentile, ScoreSummary};
