//! Browser helpers

use pagespeed_harness::browser::{find_chrome_for_testing, BrowserLauncher, BrowserSession};
use pagespeed_harness::AuditError;

/// Check if browser tests should be skipped (when Chrome isn't available)
pub fn should_skip() -> bool {
    std::env::var("SKIP_BROWSER_TESTS").is_ok()
}

/// Macro to skip test if Chrome isn't available
#[macro_export]
macro_rules! skip_if_no_chrome {
    () => {
        if browser::should_skip() {
            eprintln!("Skipping test: SKIP_BROWSER_TESTS is set");
            return;
        }
    };
}

/// Headless launcher using Chrome for Testing when Puppeteer installed it
pub fn test_launcher() -> BrowserLauncher {
    let executable = find_chrome_for_testing();
    if let Some(ref path) = executable {
        eprintln!("Using Chrome for Testing: {}", path.display());
    }
    BrowserLauncher {
        executable,
        ..BrowserLauncher::default()
    }
}

/// Launch a Ready session, or `None` when no Chrome can be found
pub async fn require_session() -> Option<BrowserSession> {
    let mut session = BrowserSession::new(test_launcher());
    match session.launch().await {
        Ok(()) => Some(session),
        Err(AuditError::Launch(msg)) if msg.contains("Could not auto detect") => {
            eprintln!("Skipping: Chrome not installed ({})", msg);
            None
        }
        Err(e) => panic!("Unexpected browser error: {}", e),
    }
}
