//! The reading site, behind a trait so the loop can be driven without a browser

pub mod mangabuff;
pub mod parse;
pub mod scroll;

pub use mangabuff::MangaBuff;

use crate::browser::{BrowserError, DebugCapture};
use crate::interrupt::Interrupts;
use crate::models::{ChapterRef, Credentials, LoginOutcome, ReadOutcome};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error("Element not found: {what}")]
    MissingElement {
        what: String,
        capture: Option<DebugCapture>,
    },
}

impl SiteError {
    pub fn missing(what: impl Into<String>) -> Self {
        SiteError::MissingElement {
            what: what.into(),
            capture: None,
        }
    }

    pub fn is_connection_loss(&self) -> bool {
        matches!(self, SiteError::Browser(e) if e.is_connection_loss())
    }

    /// Debug capture taken when the failure happened, if any
    pub fn capture(&self) -> Option<&DebugCapture> {
        match self {
            SiteError::Browser(e) => e.capture(),
            SiteError::MissingElement { capture, .. } => capture.as_ref(),
        }
    }
}

/// Everything the reading loop needs from the site
pub trait Site {
    /// One login attempt
    fn login(&mut self, credentials: &Credentials) -> Result<LoginOutcome, SiteError>;

    /// Whether the current page shows a logged-in session
    fn is_logged_in(&mut self) -> Result<bool, SiteError>;

    /// Title slugs listed on a catalog page; empty when the page has none
    fn catalog_page(&mut self, page: u32) -> Result<Vec<String>, SiteError>;

    /// Chapters of a title in reading order
    fn chapters(&mut self, slug: &str) -> Result<Vec<ChapterRef>, SiteError>;

    /// Open a chapter, mark the title as favourite and scroll through it
    fn read_chapter(
        &mut self,
        slug: &str,
        chapter: ChapterRef,
        interrupts: &Interrupts,
    ) -> Result<ReadOutcome, SiteError>;

    /// Save screenshot, markup and cookies for post-mortem
    fn capture_debug(&mut self, prefix: &str) -> Option<DebugCapture>;

    fn screenshot(&mut self, path: &Path) -> Result<(), SiteError>;

    /// Get back to a usable session after a failure
    fn recover(&mut self) -> Result<(), SiteError>;
}
