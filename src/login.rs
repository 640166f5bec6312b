use crate::error::BotError;
use crate::interrupt::Interrupts;
use crate::models::{Credentials, LoginOutcome};
use crate::notifier::{notify_quietly, Notify};
use crate::site::Site;

/// Log in with up to `max_attempts` tries, then confirm the session.
/// Running out of attempts ends the run.
pub fn run<S: Site + ?Sized>(
    site: &mut S,
    notifier: &dyn Notify,
    credentials: &Credentials,
    max_attempts: u32,
    interrupts: &Interrupts,
) -> Result<(), BotError> {
    let max_attempts = max_attempts.max(1);
    let mut logged_in = false;

    for attempt in 1..=max_attempts {
        interrupts.check()?;
        log::info!("Login attempt #{}", attempt);
        notify_quietly(notifier, &format!("🔑 Login attempt #{}...", attempt));

        match site.login(credentials) {
            Ok(LoginOutcome::LoggedIn) => {
                log::info!("Logged in as {}", credentials.email);
                notify_quietly(notifier, "✅ Logged in successfully!");
                logged_in = true;
                break;
            }
            Ok(LoginOutcome::Rejected) => {
                log::error!("Invalid email or password");
                notify_quietly(notifier, "❌ Invalid email or password!");
            }
            Ok(LoginOutcome::Undetermined) => {
                log::error!("Could not determine the login result");
            }
            Err(e) => {
                log::error!("Login attempt #{} failed: {}", attempt, e);
                if let Some(capture) = e.capture() {
                    let caption = format!("🐛 Debug: {}", capture.label);
                    if let Err(e) = notifier.send_photo(&capture.screenshot, &caption) {
                        log::warn!("Could not upload debug screenshot: {}", e);
                    }
                }
            }
        }
    }

    if !logged_in {
        log::error!("Reached the maximum number of login attempts");
        return Err(BotError::LoginFailed {
            attempts: max_attempts,
        });
    }

    if !site.is_logged_in()? {
        log::error!("Login could not be confirmed");
        return Err(BotError::NotLoggedIn);
    }
    Ok(())
}
