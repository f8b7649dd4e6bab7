//! Browser session lifecycle
//!
//! A [`BrowserSession`] owns one headless Chrome launched through
//! chromiumoxide. The local audit engine connects to it over the DevTools
//! port exposed by [`BrowserSession::endpoint`].
//!
//! ```text
//!  Uninitialized ──launch()──▶ Ready ──close()──▶ Closed
//!                                 │                  ▲
//!                                 └──── drop ────────┘
//! ```
//!
//! `close()` is idempotent. If a session is dropped while still Ready (an
//! early return, a panic, or the orchestrator future being cancelled), the
//! event-handler task is aborted and chromiumoxide kills the child process.
//!
//! # Example
//!
//! ```no_run
//! use pagespeed_harness::browser::{BrowserLauncher, BrowserSession};
//!
//! # async fn example() -> Result<(), pagespeed_harness::AuditError> {
//! let mut session = BrowserSession::new(BrowserLauncher::default());
//! session.launch().await?;
//! println!("DevTools port: {}", session.endpoint()?.port);
//! session.close().await;
//! # Ok(())
//! # }
//! ```

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, instrument, warn};

use crate::config::LocalConfig;
use crate::error::AuditError;

/// Lifecycle state of a [`BrowserSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Closed,
}

/// Where the audit engine reaches the running browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEndpoint {
    /// DevTools websocket URL reported by Chrome
    pub websocket_url: String,
    /// Remote debugging port parsed from the websocket URL
    pub port: u16,
}

impl SessionEndpoint {
    pub fn from_websocket_url(websocket_url: &str) -> Result<Self, AuditError> {
        let port = reqwest::Url::parse(websocket_url)
            .ok()
            .and_then(|u| u.port())
            .ok_or_else(|| {
                AuditError::Launch(format!(
                    "browser reported an unusable DevTools address: {}",
                    websocket_url
                ))
            })?;

        Ok(Self {
            websocket_url: websocket_url.to_string(),
            port,
        })
    }
}

/// How to start Chrome
#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub extra_args: Vec<String>,
}

impl Default for BrowserLauncher {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            extra_args: Vec::new(),
        }
    }
}

impl From<&LocalConfig> for BrowserLauncher {
    fn from(local: &LocalConfig) -> Self {
        Self {
            executable: local.chrome_executable.clone(),
            headless: local.headless,
            extra_args: local.extra_args.clone(),
        }
    }
}

impl BrowserLauncher {
    /// Configured executable, else Chrome for Testing from the Puppeteer
    /// cache, else `None` to let chromiumoxide auto-detect
    fn resolve_executable(&self) -> Result<Option<PathBuf>, AuditError> {
        match &self.executable {
            Some(path) if !path.exists() => Err(AuditError::Launch(format!(
                "browser executable not found: {}",
                path.display()
            ))),
            Some(path) => Ok(Some(path.clone())),
            None => Ok(find_chrome_for_testing()),
        }
    }

    fn browser_config(&self) -> Result<(BrowserConfig, ProfileDir), AuditError> {
        static SESSION_ID: AtomicU64 = AtomicU64::new(0);

        let mut builder = BrowserConfig::builder();
        if let Some(path) = self.resolve_executable()? {
            debug!("Using browser executable: {}", path.display());
            builder = builder.chrome_executable(path);
        }
        if !self.headless {
            builder = builder.with_head();
        }
        if !self.extra_args.is_empty() {
            builder = builder.args(self.extra_args.iter().map(String::as_str));
        }

        // Unique profile per session so parallel harness processes never share state
        let user_data_dir = std::env::temp_dir().join(format!(
            "pagespeed-harness-{}-{}",
            std::process::id(),
            SESSION_ID.fetch_add(1, Ordering::SeqCst)
        ));
        let profile = ProfileDir::new(user_data_dir);

        let config = builder
            .user_data_dir(profile.path())
            .build()
            .map_err(|e| AuditError::Launch(format!("invalid browser configuration: {}", e)))?;
        Ok((config, profile))
    }
}

/// Chrome profile directory of one session, removed on drop
#[derive(Debug)]
pub struct ProfileDir {
    path: PathBuf,
}

impl ProfileDir {
    pub fn new(path: PathBuf) -> Self {
        if path.exists() {
            let _ = std::fs::remove_dir_all(&path);
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed browser profile {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove browser profile {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Find Chrome for Testing installed by Puppeteer
pub fn find_chrome_for_testing() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let puppeteer_cache = Path::new(&home).join(".cache/puppeteer/chrome");

    let mut versions: Vec<_> = std::fs::read_dir(&puppeteer_cache)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    sort_newest_first(&mut versions);

    versions.into_iter().find_map(|version_dir| {
        [
            "chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
            "chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
            "chrome-linux64/chrome",
        ]
        .iter()
        .map(|rel| version_dir.join(rel))
        .find(|p| p.exists())
    })
}

/// Numeric version of a cache entry such as `linux-120.0.6099.109`
fn version_key(dir: &Path) -> Vec<u64> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let version = name.rsplit('-').next().unwrap_or_default();
    version
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}

fn sort_newest_first(versions: &mut [PathBuf]) {
    versions.sort_by(|a, b| version_key(b).cmp(&version_key(a)));
}

struct RunningBrowser {
    browser: Browser,
    handler: tokio::task::JoinHandle<()>,
    endpoint: SessionEndpoint,
    // last field: dropped after `browser`
    profile: ProfileDir,
}

/// One browser process, owned by exactly one URL's audits
pub struct BrowserSession {
    launcher: BrowserLauncher,
    state: SessionState,
    running: Option<RunningBrowser>,
}

impl BrowserSession {
    pub fn new(launcher: BrowserLauncher) -> Self {
        Self {
            launcher,
            state: SessionState::Uninitialized,
            running: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Start the browser and move to Ready
    ///
    /// # Errors
    ///
    /// [`AuditError::Launch`] if the process cannot be started, or if the
    /// session is not Uninitialized.
    #[instrument(skip(self))]
    pub async fn launch(&mut self) -> Result<(), AuditError> {
        if self.state != SessionState::Uninitialized {
            return Err(AuditError::Launch(format!(
                "session cannot be launched from state {:?}",
                self.state
            )));
        }

        info!("Launching browser for audit session");
        let (config, profile) = self.launcher.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AuditError::Launch(e.to_string()))?;

        // Spawn handler to process browser events
        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let endpoint = match SessionEndpoint::from_websocket_url(browser.websocket_address()) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                handler.abort();
                return Err(e);
            }
        };

        info!(port = endpoint.port, "Browser ready");
        self.running = Some(RunningBrowser {
            browser,
            handler,
            endpoint,
            profile,
        });
        self.state = SessionState::Ready;
        Ok(())
    }

    /// DevTools endpoint of the Ready session
    pub fn endpoint(&self) -> Result<SessionEndpoint, AuditError> {
        match (&self.state, &self.running) {
            (SessionState::Ready, Some(running)) => Ok(running.endpoint.clone()),
            _ => Err(AuditError::Launch(format!(
                "no Ready browser session (state {:?})",
                self.state
            ))),
        }
    }

    /// Profile directory of the running browser
    pub fn profile_dir(&self) -> Option<&Path> {
        self.running.as_ref().map(|r| r.profile.path())
    }

    /// Shut the browser down; a no-op unless Ready
    ///
    /// Never fails: shutdown problems are logged, and the state is Closed
    /// afterwards regardless.
    #[instrument(skip(self))]
    pub async fn close(&mut self) {
        let Some(mut running) = self.running.take() else {
            if self.state == SessionState::Uninitialized {
                self.state = SessionState::Closed;
            }
            return;
        };
        self.state = SessionState::Closed;

        info!("Closing browser");
        if let Err(e) = running.browser.close().await {
            warn!("Browser close command failed: {}", e);
            if let Some(Err(e)) = running.browser.kill().await {
                warn!("Failed to kill browser process: {}", e);
            }
        }
        if let Err(e) = running.browser.wait().await {
            debug!("Waiting for browser exit failed: {}", e);
        }
        running.handler.abort();
        // dropping `running` removes the profile directory
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            warn!("Browser session dropped without close(); tearing it down");
            running.handler.abort();
            // dropping `running` kills the child process, then removes the profile
        }
    }
}
