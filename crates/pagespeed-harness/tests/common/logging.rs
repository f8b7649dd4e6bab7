//! Test log output
//!
//! Set RUST_LOG (e.g. `RUST_LOG=pagespeed_harness=debug`) to see harness
//! logs in test output.

use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once per test binary
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
