use clap::Parser;
use manga_reader_bot::browser::{BrowserKind, BrowserSession};
use manga_reader_bot::config::{OperatorConfig, Tuning};
use manga_reader_bot::identity::Identity;
use manga_reader_bot::interrupt::{Interrupt, Interrupts, KeyboardListener};
use manga_reader_bot::notifier::{notify_quietly, Notify, NullNotifier, TelegramNotifier};
use manga_reader_bot::pacing::ReadingRate;
use manga_reader_bot::site::MangaBuff;
use manga_reader_bot::state::{ResumeState, StateStore};
use manga_reader_bot::{logging, prompt, report, BotError, Driver, DriverOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Browser to drive: chrome, chromium, edge, yandex or opera
    #[arg(short, long)]
    browser: Option<BrowserKind>,

    /// Reading speed in chapters per hour (1-666); asked interactively when absent
    #[arg(short, long)]
    speed: Option<ReadingRate>,

    /// Operator configuration with the Telegram bot credentials
    #[arg(short, long, default_value = OperatorConfig::FILE)]
    config: PathBuf,

    /// Optional tuning file
    #[arg(short, long, default_value = Tuning::FILE)]
    tuning: PathBuf,

    /// Directory holding the identity and resume-state files
    #[arg(long, default_value = ".")]
    state_dir: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let operator = match OperatorConfig::load(&cli.config) {
        Ok(Some(config)) => Some(config),
        Ok(None) => {
            return match OperatorConfig::write_placeholder(&cli.config) {
                Ok(()) => {
                    println!(
                        "Created {}. Fill in your Telegram bot token and chat id, then start again.",
                        cli.config.display()
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::FAILURE
                }
            };
        }
        Err(e) => {
            eprintln!("{}; continuing without Telegram notifications", e);
            None
        }
    };

    let identity = Identity::load_or_create(&cli.state_dir.join(Identity::FILE));
    if let Err(e) = logging::init(Path::new(logging::LOG_FILE), &identity.short_id(), cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    log::info!("Starting bot for {}", identity.display_name());
    log::info!("Installation id: {}", identity.installation_id);

    let tuning = Tuning::load(&cli.tuning);
    let notifier = build_notifier(operator.as_ref(), &identity, &tuning);
    notify_quietly(
        notifier.as_ref(),
        &format!("🚀 Bot started for {}", identity.display_name()),
    );

    let store = StateStore::for_identity(&cli.state_dir, &identity.short_id());
    let state = match store.load() {
        Some(state) => {
            log::info!("Loaded saved state from {}", store.path().display());
            notify_quietly(notifier.as_ref(), "⚙ Loaded saved bot state");
            state
        }
        None => ResumeState::default(),
    };

    let session = match start_session(&cli, &tuning) {
        Ok(session) => session,
        Err(e) => return fail_before_session(&e, &state, notifier.as_ref()),
    };

    let interrupts = Interrupts::new();
    let mut driver = Driver::new(
        MangaBuff::new(session, &tuning.base_url),
        notifier.clone(),
        store,
        state,
        interrupts.clone(),
        DriverOptions::from_tuning(&tuning),
    );

    let mut listener = None;
    let result = operate(&mut driver, &cli, &tuning, &notifier, &interrupts, &mut listener);

    let code = match &result {
        Ok(()) => ExitCode::SUCCESS,
        Err(BotError::Interrupted(Interrupt::Stop)) => {
            log::info!("Stopped by the operator");
            driver.save_state();
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Critical error: {}", e);
            driver.save_state();
            notify_quietly(
                notifier.as_ref(),
                &report::critical_message(&e.to_string(), driver.state()),
            );
            ExitCode::FAILURE
        }
    };

    interrupts.request_stop();
    if let Some(listener) = listener {
        listener.join();
    }

    // Dropping the driver drops the browser session and kills the process
    drop(driver);
    log::info!("Browser closed");
    notify_quietly(notifier.as_ref(), "🛑 Browser closed, work finished");
    code
}

/// Login, reading speed, key listener, then the reading loop
fn operate(
    driver: &mut Driver<MangaBuff>,
    cli: &Cli,
    tuning: &Tuning,
    notifier: &Arc<dyn Notify>,
    interrupts: &Interrupts,
    listener: &mut Option<KeyboardListener>,
) -> Result<(), BotError> {
    let credentials = prompt::credentials()?;
    driver.login(&credentials, tuning.retry.login_attempts)?;

    let rate = match cli.speed {
        Some(rate) => rate,
        None => prompt::reading_rate()?,
    };
    driver.set_reading_rate(rate);

    prompt::print_controls();
    match KeyboardListener::spawn(interrupts.clone(), notifier.clone()) {
        Ok(spawned) => *listener = Some(spawned),
        Err(e) => log::warn!("Keyboard controls unavailable: {}", e),
    }

    driver.run()
}

fn start_session(cli: &Cli, tuning: &Tuning) -> Result<BrowserSession, BotError> {
    let config = tuning.browser_config(cli.browser)?;
    let session = BrowserSession::launch(config)?;
    Ok(session
        .with_retry(tuning.retry_policy())
        .with_debug_dir(cli.state_dir.join("debug")))
}

fn build_notifier(operator: Option<&OperatorConfig>, identity: &Identity, tuning: &Tuning) -> Arc<dyn Notify> {
    let Some(operator) = operator.filter(|config| !config.is_placeholder()) else {
        log::warn!("Telegram is not configured; notifications are disabled");
        return Arc::new(NullNotifier);
    };

    match TelegramNotifier::new(&operator.telegram, identity) {
        Ok(notifier) => Arc::new(notifier.with_backoff(tuning.notifier_backoff())),
        Err(e) => {
            log::error!("Could not create Telegram client: {}", e);
            Arc::new(NullNotifier)
        }
    }
}

fn fail_before_session(error: &BotError, state: &ResumeState, notifier: &dyn Notify) -> ExitCode {
    log::error!("Critical error: {}", error);
    notify_quietly(notifier, &report::critical_message(&error.to_string(), state));
    ExitCode::FAILURE
}
