use crate::browser::{BrowserConfig, BrowserError, BrowserKind, RetryPolicy};
use crate::notifier::Backoff;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const PLACEHOLDER_TOKEN: &str = "YOUR_TELEGRAM_BOT_TOKEN";
const PLACEHOLDER_CHAT_ID: &str = "YOUR_CHAT_ID";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Operator configuration, `config.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatorConfig {
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}

impl OperatorConfig {
    pub const FILE: &'static str = "config.json";

    /// `Ok(None)` when the file does not exist
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(config))
    }

    pub fn placeholder() -> Self {
        Self {
            telegram: TelegramConfig {
                token: PLACEHOLDER_TOKEN.to_string(),
                chat_id: PLACEHOLDER_CHAT_ID.to_string(),
            },
        }
    }

    /// Write the template the operator is asked to fill in, indented by four spaces
    pub fn write_placeholder(path: &Path) -> Result<(), ConfigError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        Self::placeholder()
            .serialize(&mut ser)
            .map_err(|source| ConfigError::Json {
                path: path.display().to_string(),
                source,
            })?;

        fs::write(path, buf).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }

    /// Still holds the template values (or nothing usable)
    pub fn is_placeholder(&self) -> bool {
        let token = self.telegram.token.trim();
        let chat = self.telegram.chat_id.trim();
        token.is_empty() || chat.is_empty() || token == PLACEHOLDER_TOKEN || chat == PLACEHOLDER_CHAT_ID
    }
}

/// Optional tuning file, `bot.toml`
#[derive(Debug, Deserialize, Clone)]
pub struct Tuning {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub browser: BrowserTuning,
    #[serde(default)]
    pub retry: RetryTuning,
    #[serde(default)]
    pub catalog: CatalogTuning,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserTuning {
    /// chrome, chromium, edge, yandex or opera
    #[serde(default = "default_browser")]
    pub kind: String,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Page load timeout in seconds
    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout_secs: u64,

    /// Element wait timeout in seconds
    #[serde(default = "default_element_timeout")]
    pub element_timeout_secs: u64,

    #[serde(default = "default_false")]
    pub disable_images: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryTuning {
    /// Attempts for guarded browser operations
    #[serde(default = "default_attempts")]
    pub navigation_attempts: u32,

    /// Linear backoff unit between browser attempts, in seconds
    #[serde(default = "default_navigation_backoff")]
    pub navigation_backoff_secs: u64,

    #[serde(default = "default_attempts")]
    pub notifier_attempts: u32,

    /// Exponential backoff base for the notifier, in seconds
    #[serde(default = "default_notifier_backoff")]
    pub notifier_backoff_secs: u64,

    #[serde(default = "default_attempts")]
    pub login_attempts: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogTuning {
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Consecutive empty pages before the cursor rewinds to page 1
    #[serde(default = "default_empty_page_limit")]
    pub empty_page_limit: u32,

    /// Send a status report each time the processed count hits a multiple of this
    #[serde(default = "default_status_report_every")]
    pub status_report_every: usize,
}

fn default_base_url() -> String { "https://mangabuff.ru".to_string() }
fn default_browser() -> String { "chrome".to_string() }
fn default_true() -> bool { true }
fn default_false() -> bool { false }
fn default_page_load_timeout() -> u64 { 90 }
fn default_element_timeout() -> u64 { 45 }
fn default_attempts() -> u32 { 3 }
fn default_navigation_backoff() -> u64 { 5 }
fn default_notifier_backoff() -> u64 { 1 }
fn default_max_pages() -> u32 { 100 }
fn default_empty_page_limit() -> u32 { 3 }
fn default_status_report_every() -> usize { 10 }

impl Default for BrowserTuning {
    fn default() -> Self {
        Self {
            kind: default_browser(),
            headless: true,
            page_load_timeout_secs: default_page_load_timeout(),
            element_timeout_secs: default_element_timeout(),
            disable_images: false,
        }
    }
}

impl Default for RetryTuning {
    fn default() -> Self {
        Self {
            navigation_attempts: 3,
            navigation_backoff_secs: 5,
            notifier_attempts: 3,
            notifier_backoff_secs: 1,
            login_attempts: 3,
        }
    }
}

impl Default for CatalogTuning {
    fn default() -> Self {
        Self {
            max_pages: 100,
            empty_page_limit: 3,
            status_report_every: 10,
        }
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            browser: BrowserTuning::default(),
            retry: RetryTuning::default(),
            catalog: CatalogTuning::default(),
        }
    }
}

impl Tuning {
    pub const FILE: &'static str = "bot.toml";

    /// Load the tuning file; a missing file silently yields the defaults,
    /// an invalid one is reported and ignored.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                log::warn!("Could not read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Browser launch configuration; `kind_override` (from the command line) wins
    pub fn browser_config(&self, kind_override: Option<BrowserKind>) -> Result<BrowserConfig, BrowserError> {
        let kind = match kind_override {
            Some(kind) => kind,
            None => self.browser.kind.parse()?,
        };
        Ok(BrowserConfig {
            kind,
            headless: self.browser.headless,
            page_load_timeout_secs: self.browser.page_load_timeout_secs,
            element_timeout_secs: self.browser.element_timeout_secs,
            disable_images: self.browser.disable_images,
            ..BrowserConfig::default()
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry.navigation_attempts.max(1),
            backoff: Duration::from_secs(self.retry.navigation_backoff_secs),
        }
    }

    pub fn notifier_backoff(&self) -> Backoff {
        Backoff {
            max_attempts: self.retry.notifier_attempts.max(1),
            base: Duration::from_secs(self.retry.notifier_backoff_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_placeholder_is_written_with_four_space_indent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(OperatorConfig::FILE);
        OperatorConfig::write_placeholder(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n    \"telegram\": {"));
        assert!(content.contains("\n        \"token\": \"YOUR_TELEGRAM_BOT_TOKEN\""));

        let loaded = OperatorConfig::load(&path).unwrap().unwrap();
        assert!(loaded.is_placeholder());
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(OperatorConfig::FILE);
        assert!(OperatorConfig::load(&path).unwrap().is_none());

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            OperatorConfig::load(&path),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn test_filled_config_is_not_placeholder() {
        let config: OperatorConfig =
            serde_json::from_str(r#"{"telegram":{"token":"123:abc","chat_id":"-100"}}"#).unwrap();
        assert!(!config.is_placeholder());
    }

    #[test]
    fn test_tuning_defaults_fill_missing_fields() {
        let tuning = Tuning::parse(
            r#"
            [browser]
            kind = "edge"

            [catalog]
            max_pages = 40
            "#,
        )
        .unwrap();

        assert_eq!(tuning.base_url, "https://mangabuff.ru");
        assert_eq!(tuning.catalog.max_pages, 40);
        assert_eq!(tuning.catalog.empty_page_limit, 3);
        assert_eq!(tuning.retry.login_attempts, 3);

        let config = tuning.browser_config(None).unwrap();
        assert_eq!(config.kind, BrowserKind::Edge);
        assert_eq!(config.page_load_timeout_secs, 90);
    }

    #[test]
    fn test_browser_override_and_unsupported_kind() {
        let mut tuning = Tuning::default();
        tuning.browser.kind = "firefox".to_string();
        assert!(matches!(
            tuning.browser_config(None),
            Err(BrowserError::UnsupportedBrowser(_))
        ));

        let config = tuning.browser_config(Some(BrowserKind::Opera)).unwrap();
        assert_eq!(config.kind, BrowserKind::Opera);
    }

    #[test]
    fn test_missing_tuning_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let tuning = Tuning::load(&dir.path().join(Tuning::FILE));
        assert_eq!(tuning.retry_policy().attempts, 3);
        assert_eq!(tuning.notifier_backoff().base, Duration::from_secs(1));
    }
}
