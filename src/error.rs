use crate::browser::BrowserError;
use crate::interrupt::Interrupt;
use crate::site::SiteError;

/// Errors that end a run or abandon a loop iteration
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error(transparent)]
    Interrupted(#[from] Interrupt),

    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Site(#[from] SiteError),

    #[error("Login failed after {attempts} attempts")]
    LoginFailed { attempts: u32 },

    #[error("Not logged in after the login procedure")]
    NotLoggedIn,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_failures_keep_their_message() {
        let err: BotError = BrowserError::UnsupportedBrowser("firefox".to_string()).into();
        assert!(matches!(err, BotError::Browser(_)));
        assert_eq!(err.to_string(), "Unsupported browser: firefox");

        let err: BotError = Interrupt::Stop.into();
        assert!(matches!(err, BotError::Interrupted(Interrupt::Stop)));
    }
}
