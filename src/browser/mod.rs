//! Browser session management for the reading bot
//!
//! This module owns the single headless Chrome instance the bot drives. It
//! provides the launch configuration, the session manager with its guarded
//! (retry + relaunch) operations, and low-level page helpers.
//!
//! # Example
//!
//! ```no_run
//! use manga_reader_bot::browser::{BrowserConfig, BrowserSession};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = BrowserSession::launch(BrowserConfig::default())?;
//!
//! // Retried up to three times, relaunching the browser if it died
//! session.ensure_navigated("https://example.com")?;
//!
//! let capture = session.capture_debug("example_")?;
//! println!("Screenshot at {}", capture.screenshot.display());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod page;

// Re-export main types for convenience
pub use config::{BrowserConfig, BrowserKind};
pub use manager::{BrowserError, BrowserSession, DebugCapture, RetryPolicy};
