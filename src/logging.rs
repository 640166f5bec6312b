use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    append::file::FileAppender,
    config::{Appender, Logger, Root},
    encode::pattern::PatternEncoder,
    Config,
};
use std::path::Path;

pub const LOG_FILE: &str = "manga_bot_log.txt";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to open log file: {0}")]
    File(#[from] std::io::Error),

    #[error("Invalid logging configuration: {0}")]
    Config(String),

    #[error("Logger already initialized: {0}")]
    Init(#[from] log::SetLoggerError),
}

/// Line pattern tagged with the installation's short id. The console variant
/// ends in CRLF since the keyboard listener keeps the terminal in raw mode.
fn pattern(short_id: &str, line_end: &str) -> String {
    format!("[USER:{}][{{d(%Y-%m-%d %H:%M:%S)}}] {{l}} {{m}}{}", short_id, line_end)
}

/// Log to the console and append to `path`
pub fn init(path: &Path, short_id: &str, verbose: bool) -> Result<(), LoggingError> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(&pattern(short_id, "\r\n"))))
        .build();

    let file = FileAppender::builder()
        .append(true)
        .encoder(Box::new(PatternEncoder::new(&pattern(short_id, "{n}"))))
        .build(path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("file", Box::new(file)))
        // CDP traffic and connection pool chatter
        .logger(Logger::builder().build("headless_chrome", LevelFilter::Warn))
        .logger(Logger::builder().build("tungstenite", LevelFilter::Warn))
        .logger(Logger::builder().build("reqwest", LevelFilter::Warn))
        .build(Root::builder().appender("stdout").appender("file").build(level))
        .map_err(|e| LoggingError::Config(e.to_string()))?;

    log4rs::init_config(config)?;
    log::debug!("Logging initialized. Log file: {}", path.display());
    Ok(())
}
