use super::manager::BrowserError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Flags every session is launched with, whatever the browser kind.
pub const BASE_FLAGS: &[&str] = &["--disable-gpu", "--no-sandbox", "--disable-dev-shm-usage"];

/// Chromium-family browsers the session manager knows how to launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowserKind {
    #[default]
    Chrome,
    Chromium,
    Edge,
    Yandex,
    Opera,
}

impl BrowserKind {
    pub const ALL: [BrowserKind; 5] = [
        BrowserKind::Chrome,
        BrowserKind::Chromium,
        BrowserKind::Edge,
        BrowserKind::Yandex,
        BrowserKind::Opera,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "chrome",
            BrowserKind::Chromium => "chromium",
            BrowserKind::Edge => "edge",
            BrowserKind::Yandex => "yandex",
            BrowserKind::Opera => "opera",
        }
    }

    /// Executable to launch. `None` lets headless_chrome find Chrome/Chromium itself.
    pub fn executable(&self) -> Option<PathBuf> {
        let local_app_data = || std::env::var("LOCALAPPDATA").unwrap_or_default();
        match self {
            BrowserKind::Chrome | BrowserKind::Chromium => None,
            BrowserKind::Edge => Some(if cfg!(windows) {
                PathBuf::from(r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe")
            } else if cfg!(target_os = "macos") {
                PathBuf::from("/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge")
            } else {
                PathBuf::from("/usr/bin/microsoft-edge")
            }),
            BrowserKind::Yandex => Some(if cfg!(windows) {
                PathBuf::from(local_app_data()).join(r"Yandex\YandexBrowser\Application\browser.exe")
            } else {
                PathBuf::from("/usr/bin/yandex-browser")
            }),
            BrowserKind::Opera => Some(if cfg!(windows) {
                PathBuf::from(local_app_data()).join(r"Programs\Opera\opera.exe")
            } else {
                PathBuf::from("/usr/bin/opera")
            }),
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BrowserKind {
    type Err = BrowserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chrome" | "google-chrome" => Ok(BrowserKind::Chrome),
            "chromium" => Ok(BrowserKind::Chromium),
            "edge" | "msedge" => Ok(BrowserKind::Edge),
            "yandex" => Ok(BrowserKind::Yandex),
            "opera" => Ok(BrowserKind::Opera),
            other => Err(BrowserError::UnsupportedBrowser(other.to_string())),
        }
    }
}

/// Configuration for the reading session's browser
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Which browser binary to drive
    pub kind: BrowserKind,

    /// Run browser in headless mode
    pub headless: bool,

    /// Browser window size
    pub window_size: (u32, u32),

    /// Custom user agent
    pub user_agent: Option<String>,

    /// Page load timeout in seconds
    pub page_load_timeout_secs: u64,

    /// Element wait timeout in seconds
    pub element_timeout_secs: u64,

    /// How long the CDP connection may stay silent before it is dropped.
    /// Must outlast the longest pacing delay between chapters.
    pub idle_timeout_secs: u64,

    /// Disable image loading
    pub disable_images: bool,

    /// Additional Chrome flags
    pub extra_flags: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: BrowserKind::default(),
            headless: true,
            window_size: (1920, 1080),
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36"
                    .to_string(),
            ),
            page_load_timeout_secs: 90,
            element_timeout_secs: 45,
            idle_timeout_secs: 2 * 60 * 60,
            disable_images: false,
            extra_flags: vec![],
        }
    }
}

impl BrowserConfig {
    /// Command line flags passed to the browser process
    pub fn launch_args(&self) -> Vec<String> {
        let mut args: Vec<String> = BASE_FLAGS.iter().map(|f| f.to_string()).collect();

        if self.disable_images {
            args.push("--blink-settings=imagesEnabled=false".to_string());
        }
        if let Some(ref ua) = self.user_agent {
            args.push(format!("--user-agent={}", ua));
        }
        args.extend(self.extra_flags.iter().cloned());
        args
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}
