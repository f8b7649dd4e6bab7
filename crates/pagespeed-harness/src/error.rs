//! Error taxonomy for audits
//!
//! Threshold violations are not errors: they surface as failing
//! [`Verdict`](crate::evaluate::Verdict)s. Everything here is an
//! infrastructure failure, and [`AuditError::is_fatal`] decides whether it
//! ends the whole run or only the URL being audited.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuditError {
    /// Missing API key, missing engine binary, invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The browser process could not be started
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Audit timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The provider response lacked a field the schema requires
    #[error("Failed to parse audit response: {0}")]
    Parse(String),
}

impl AuditError {
    /// Configuration and launch failures abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, AuditError::Configuration(_) | AuditError::Launch(_))
    }

    /// Short label used in reports and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AuditError::Configuration(_) => "configuration",
            AuditError::Launch(_) => "launch",
            AuditError::Network(_) => "network",
            AuditError::Timeout(_) => "timeout",
            AuditError::Parse(_) => "parse",
        }
    }
}

/// A single audit of `url` failed
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Audit of {url} failed: {source}")]
pub struct RunFailure {
    pub url: String,
    #[source]
    pub source: AuditError,
}

/// Run `failed_at_run` (1-based) of a multi-run series failed, so no mean exists
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Run {failed_at_run} of {runs} for {url} failed: {source}")]
pub struct AggregationFailure {
    pub url: String,
    pub failed_at_run: u32,
    pub runs: u32,
    #[source]
    pub source: AuditError,
}

impl From<AggregationFailure> for RunFailure {
    fn from(failure: AggregationFailure) -> Self {
        RunFailure {
            url: failure.url,
            source: failure.source,
        }
    }
}
