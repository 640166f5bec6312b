use super::config::BrowserConfig;
use super::page;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Messages headless_chrome produces once the browser process or its websocket is gone.
const CONNECTION_LOSS_MARKERS: &[&str] = &[
    "connection is closed",
    "underlying connection",
    "Tried to run command without establishing a connection",
    "The event waited for never came",
    "No such target",
];

/// Retry policy for guarded browser operations: linear backoff of `backoff * attempt`
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Files written by a diagnostic capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugCapture {
    pub label: String,
    pub screenshot: PathBuf,
    pub page_source: PathBuf,
    pub cookies: PathBuf,
}

/// Owns the single browser process and tab the bot drives.
/// The process is killed when the session is dropped.
pub struct BrowserSession {
    config: BrowserConfig,
    retry: RetryPolicy,
    debug_dir: PathBuf,
    browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    /// Launch a browser with the given configuration
    pub fn launch(config: BrowserConfig) -> Result<Self, BrowserError> {
        let (browser, tab) = Self::start(&config)?;
        log::info!("Browser session started ({})", config.kind);

        Ok(Self {
            config,
            retry: RetryPolicy::default(),
            debug_dir: PathBuf::from("debug"),
            browser,
            tab,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = dir.into();
        self
    }

    fn start(config: &BrowserConfig) -> Result<(Browser, Arc<Tab>), BrowserError> {
        // LaunchOptions borrows its args, so the owned flags must outlive it
        let flags = config.launch_args();
        let args: Vec<&OsStr> = flags.iter().map(OsStr::new).collect();

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some(config.window_size))
            .path(config.kind.executable())
            .idle_browser_timeout(config.idle_timeout())
            .args(args)
            .build()
            .map_err(|e| BrowserError::ConfigurationError(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| {
            BrowserError::InitializationError(format!("{}: {}", config.kind, e))
        })?;

        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::TabCreationError(e.to_string()))?;
        tab.set_default_timeout(config.element_timeout());

        Ok((browser, tab))
    }

    /// Probe the remote session with a trivial call
    pub fn is_alive(&self) -> bool {
        self.browser.get_version().is_ok()
    }

    /// Tear down the current browser and start a fresh one
    pub fn reinitialize(&mut self) -> Result<(), BrowserError> {
        log::warn!("Relaunching browser session ({})", self.config.kind);
        let (browser, tab) = Self::start(&self.config)?;
        self.tab = tab;
        self.browser = browser;
        Ok(())
    }

    /// Run `op` against the tab with liveness checks, relaunch on connection
    /// loss and linear backoff between attempts. Exhausting the attempts
    /// takes a debug capture and returns [`BrowserError::RetriesExhausted`].
    pub fn guarded<T, F>(&mut self, label: &str, mut op: F) -> Result<T, BrowserError>
    where
        F: FnMut(&Tab) -> Result<T, BrowserError>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if !self.is_alive() {
                log::warn!("Browser connection lost before {}, restarting", label);
                if let Err(e) = self.reinitialize() {
                    log::warn!("{} ({}/{}): {}", label, attempt, attempts, e);
                    last_error = e.to_string();
                    if attempt < attempts {
                        std::thread::sleep(self.retry.delay_for(attempt));
                    }
                    continue;
                }
            }

            match op(self.tab.as_ref()) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    log::warn!(
                        "{} failed ({}/{}): {}",
                        label,
                        attempt,
                        attempts,
                        crate::helpers::truncate(&e.to_string(), 100)
                    );
                    let lost = e.is_connection_loss();
                    last_error = e.to_string();

                    if attempt == attempts {
                        break;
                    }
                    if lost {
                        if let Err(e) = self.reinitialize() {
                            log::warn!("Relaunch after connection loss failed: {}", e);
                        }
                    }
                    std::thread::sleep(self.retry.delay_for(attempt));
                }
            }
        }

        let capture = match self.capture_debug(&format!("{}_failed", label.replace(' ', "_"))) {
            Ok(capture) => Some(capture),
            Err(e) => {
                log::warn!("Could not capture debug info: {}", e);
                None
            }
        };

        Err(BrowserError::RetriesExhausted {
            label: label.to_string(),
            attempts,
            last: last_error,
            capture,
        })
    }

    /// Navigate and wait until `document.readyState` is complete, guarded
    pub fn ensure_navigated(&mut self, url: &str) -> Result<(), BrowserError> {
        let timeout = self.config.page_load_timeout();
        self.guarded("page load", |tab| page::navigate(tab, url, timeout))
    }

    /// Drop every cookie the browser holds
    pub fn clear_cookies(&self) -> Result<(), BrowserError> {
        self.tab
            .call_method(Network::ClearBrowserCookies(None))
            .map_err(|e| cdp_error(e, BrowserError::JavaScriptError))?;
        Ok(())
    }

    /// Save screenshot, page markup and cookies under the debug directory
    pub fn capture_debug(&self, prefix: &str) -> Result<DebugCapture, BrowserError> {
        std::fs::create_dir_all(&self.debug_dir)
            .map_err(|e| BrowserError::CaptureError(e.to_string()))?;

        let timestamp = chrono::Utc::now().timestamp();
        let capture = DebugCapture {
            label: format!("{}{}", prefix, timestamp),
            screenshot: self.debug_dir.join(format!("{}debug_{}.png", prefix, timestamp)),
            page_source: self
                .debug_dir
                .join(format!("{}page_source_{}.html", prefix, timestamp)),
            cookies: self.debug_dir.join(format!("{}cookies_{}.json", prefix, timestamp)),
        };

        self.screenshot(&capture.screenshot)?;

        let html = page::html(&self.tab)?;
        std::fs::write(&capture.page_source, html)
            .map_err(|e| BrowserError::CaptureError(e.to_string()))?;

        let cookies = self
            .tab
            .get_cookies()
            .map_err(|e| BrowserError::CaptureError(e.to_string()))?;
        let cookies = serde_json::to_string_pretty(&cookies)
            .map_err(|e| BrowserError::CaptureError(e.to_string()))?;
        std::fs::write(&capture.cookies, cookies)
            .map_err(|e| BrowserError::CaptureError(e.to_string()))?;

        log::info!("Saved debug capture: {}", capture.screenshot.display());
        Ok(capture)
    }

    /// Take a PNG screenshot of the current page
    pub fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        let data = page::screenshot(&self.tab)?;
        std::fs::write(path, data).map_err(|e| {
            BrowserError::CaptureError(format!("Failed to save screenshot: {}", e))
        })
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }
}

/// Map a headless_chrome error, recognising a dead connection
pub(crate) fn cdp_error(e: impl Display, wrap: fn(String) -> BrowserError) -> BrowserError {
    let message = e.to_string();
    if CONNECTION_LOSS_MARKERS.iter().any(|m| message.contains(m)) {
        BrowserError::ConnectionLost(message)
    } else {
        wrap(message)
    }
}

/// Errors that can occur during browser operations
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Unsupported browser: {0}")]
    UnsupportedBrowser(String),

    #[error("Browser initialization failed: {0}")]
    InitializationError(String),

    #[error("Browser configuration error: {0}")]
    ConfigurationError(String),

    #[error("Tab creation failed: {0}")]
    TabCreationError(String),

    #[error("Browser connection lost: {0}")]
    ConnectionLost(String),

    #[error("Navigation error: {0}")]
    NavigationError(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("JavaScript execution error: {0}")]
    JavaScriptError(String),

    #[error("Debug capture failed: {0}")]
    CaptureError(String),

    #[error("{label} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        label: String,
        attempts: u32,
        last: String,
        capture: Option<DebugCapture>,
    },
}

impl BrowserError {
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, BrowserError::ConnectionLost(_))
    }

    /// Debug capture taken when retries ran out, if any
    pub fn capture(&self) -> Option<&DebugCapture> {
        match self {
            BrowserError::RetriesExhausted { capture, .. } => capture.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserConfig;

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(15));
    }

    #[test]
    fn test_connection_loss_is_recognised() {
        let err = cdp_error(
            "Unable to make method calls because underlying connection is closed",
            BrowserError::NavigationError,
        );
        assert!(err.is_connection_loss());

        let err = cdp_error("net::ERR_NAME_NOT_RESOLVED", BrowserError::NavigationError);
        assert!(matches!(err, BrowserError::NavigationError(_)));
        assert!(!err.is_connection_loss());
    }

    #[test]
    fn test_exhausted_error_exposes_capture() {
        let capture = DebugCapture {
            label: "page_load_failed1".to_string(),
            screenshot: PathBuf::from("debug/a.png"),
            page_source: PathBuf::from("debug/a.html"),
            cookies: PathBuf::from("debug/a.json"),
        };
        let err = BrowserError::RetriesExhausted {
            label: "page load".to_string(),
            attempts: 3,
            last: "timeout".to_string(),
            capture: Some(capture.clone()),
        };
        assert_eq!(err.capture(), Some(&capture));
        assert_eq!(err.to_string(), "page load failed after 3 attempts: timeout");
    }

    #[test]
    #[ignore] // Requires Chrome to be installed
    fn test_session_launch_and_probe() {
        let session = BrowserSession::launch(BrowserConfig::default()).unwrap();
        assert!(session.is_alive());
    }

    #[test]
    #[ignore] // Requires Chrome to be installed
    fn test_session_reinitialize() {
        let mut session = BrowserSession::launch(BrowserConfig::default()).unwrap();
        session.reinitialize().unwrap();
        assert!(session.is_alive());
    }
}
