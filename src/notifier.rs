//! Operator notifications over the Telegram Bot API
//!
//! Every send is retried with exponential backoff; callers treat a final
//! failure as non-fatal and only log it.

use crate::config::TelegramConfig;
use crate::helpers::{truncate, truncate_html};
use crate::identity::Identity;
use reqwest::blocking::{multipart, Client, RequestBuilder};
use std::path::Path;
use std::time::Duration;

/// Telegram's limits on message text and media captions
pub const MAX_TEXT_CHARS: usize = 4096;
const MAX_CAPTION_CHARS: usize = 1024;

pub const TELEGRAM_API_ROOT: &str = "https://api.telegram.org";

/// Errors from the messaging endpoint
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram {method} returned {status}: {body}")]
    Api {
        method: String,
        status: u16,
        body: String,
    },

    #[error("attachment unreadable: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that can reach the operator
pub trait Notify: Send + Sync {
    /// Send an HTML-formatted text message
    fn send_text(&self, text: &str, silent: bool) -> Result<(), NotifyError>;

    /// Send an image file with a caption
    fn send_photo(&self, path: &Path, caption: &str) -> Result<(), NotifyError>;

    /// Send any file with a caption
    fn send_document(&self, path: &Path, caption: &str) -> Result<(), NotifyError>;
}

/// Notifier used when no operator channel is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notify for NullNotifier {
    fn send_text(&self, _text: &str, _silent: bool) -> Result<(), NotifyError> {
        Ok(())
    }

    fn send_photo(&self, _path: &Path, _caption: &str) -> Result<(), NotifyError> {
        Ok(())
    }

    fn send_document(&self, _path: &Path, _caption: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Bounded exponential backoff: waits `base * 2^(attempt + 1)` after a failed attempt
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub max_attempts: u32,
    pub base: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(1),
        }
    }
}

impl Backoff {
    /// Delay after the given failed attempt (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base * 2u32.saturating_pow(attempt + 1)
    }
}

/// Telegram bot client
pub struct TelegramNotifier {
    client: Client,
    api_root: String,
    token: String,
    chat_id: String,
    footer: String,
    backoff: Backoff,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, identity: &Identity) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_root: TELEGRAM_API_ROOT.to_string(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
            footer: footer(identity),
            backoff: Backoff::default(),
        })
    }

    /// Point the client at another API root (a local mock in tests)
    pub fn with_api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = root.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_root, self.token, method)
    }

    /// POST with retries. `build` is called once per attempt since multipart
    /// bodies cannot be reused.
    fn post<F>(&self, method: &str, build: F) -> Result<(), NotifyError>
    where
        F: Fn(RequestBuilder) -> Result<RequestBuilder, NotifyError>,
    {
        let attempts = self.backoff.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.send_once(method, &build) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt >= attempts {
                        log::warn!(
                            "Telegram {} failed after {} attempts: {}",
                            method,
                            attempts,
                            e
                        );
                        return Err(e);
                    }
                    log::debug!("Telegram {} attempt {}/{} failed: {}", method, attempt, attempts, e);
                    std::thread::sleep(self.backoff.delay_for(attempt - 1));
                }
            }
        }
    }

    fn send_once<F>(&self, method: &str, build: &F) -> Result<(), NotifyError>
    where
        F: Fn(RequestBuilder) -> Result<RequestBuilder, NotifyError>,
    {
        let request = build(self.client.post(self.method_url(method)))?;
        let response = request.send()?;
        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Api {
                method: method.to_string(),
                status: status.as_u16(),
                body: truncate(&response.text().unwrap_or_default(), 200),
            })
        }
    }

    fn upload(&self, method: &str, field: &'static str, path: &Path, caption: &str) -> Result<(), NotifyError> {
        let caption = truncate(caption, MAX_CAPTION_CHARS);
        self.post(method, |request| {
            let form = multipart::Form::new()
                .text("chat_id", self.chat_id.clone())
                .text("caption", caption.clone())
                .file(field, path)?;
            Ok(request.multipart(form))
        })
    }
}

impl Notify for TelegramNotifier {
    fn send_text(&self, text: &str, silent: bool) -> Result<(), NotifyError> {
        let body = format!(
            "{}{}",
            truncate_html(text, MAX_TEXT_CHARS.saturating_sub(self.footer.chars().count())),
            self.footer
        );
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": body,
            "parse_mode": "HTML",
            "disable_notification": silent,
            "disable_web_page_preview": true,
        });

        self.post("sendMessage", |request| Ok(request.json(&payload)))
    }

    fn send_photo(&self, path: &Path, caption: &str) -> Result<(), NotifyError> {
        self.upload("sendPhoto", "photo", path, caption)
    }

    fn send_document(&self, path: &Path, caption: &str) -> Result<(), NotifyError> {
        self.upload("sendDocument", "document", path, caption)
    }
}

/// Who is running the bot, appended to every text message
fn footer(identity: &Identity) -> String {
    format!(
        "\n👤 User: {}\n🆔 ID: {}",
        crate::helpers::html_escape(&identity.display_name()),
        identity.short_id()
    )
}

/// Send a message, logging instead of failing
pub fn notify_quietly(notifier: &dyn Notify, text: &str) {
    if let Err(e) = notifier.send_text(text, false) {
        log::warn!("Could not send Telegram message: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_backoff_doubles() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay_for(0), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(1), Duration::from_secs(4));
    }

    #[test]
    fn test_footer_names_installation() {
        let identity = Identity::with_parts(
            Uuid::parse_str("3f2b8c1e-0000-4000-8000-000000000000").unwrap(),
            "reader",
            "den-pc",
        );
        let footer = footer(&identity);
        assert!(footer.contains("reader@den-pc"));
        assert!(footer.contains("🆔 ID: 3f2b8c1e"));
    }

    #[test]
    fn test_method_url() {
        let identity = Identity::generate();
        let config = TelegramConfig {
            token: "123:abc".to_string(),
            chat_id: "42".to_string(),
        };
        let notifier = TelegramNotifier::new(&config, &identity)
            .unwrap()
            .with_api_root("http://localhost:9999/");
        assert_eq!(
            notifier.method_url("sendMessage"),
            "http://localhost:9999/bot123:abc/sendMessage"
        );
    }
}
