// Library interface for manga_reader_bot
// The binary and the integration tests use the loop through these modules

pub mod browser;
pub mod config;
pub mod driver;
pub mod error;
pub mod helpers;
pub mod identity;
pub mod interrupt;
pub mod logging;
pub mod login;
pub mod models;
pub mod notifier;
pub mod pacing;
pub mod prompt;
pub mod report;
pub mod site;
pub mod state;

pub use driver::{Driver, DriverOptions};
pub use error::BotError;
