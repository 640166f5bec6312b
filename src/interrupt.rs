//! Operator interrupts: a cancellation handle shared between the keyboard
//! listener thread and the reading loop.
//!
//! The loop only looks at the flags at its checkpoints (between scroll steps,
//! between chapters, during the pacing wait, before each catalog visit), so an
//! interrupt is observed eventually and never preempts a browser call.

use crate::notifier::Notify;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const QUIT_KEY: char = 'q';
pub const SWITCH_KEY: char = 'u';

const KEY_POLL: Duration = Duration::from_millis(100);

/// What the operator asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupt {
    #[error("stop requested by the operator")]
    Stop,
    #[error("switch to another title requested by the operator")]
    Switch,
}

#[derive(Debug, Default)]
struct Flags {
    stop: AtomicBool,
    switch: AtomicBool,
}

/// Cloneable handle over the stop/switch flags
#[derive(Debug, Clone, Default)]
pub struct Interrupts {
    flags: Arc<Flags>,
}

impl Interrupts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.flags.stop.store(true, Ordering::Release);
    }

    pub fn request_switch(&self) {
        self.flags.switch.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.flags.stop.load(Ordering::Acquire)
    }

    pub fn is_switch_pending(&self) -> bool {
        self.flags.switch.load(Ordering::Acquire)
    }

    /// Checkpoint: `Err` with the pending interrupt, stop taking priority.
    /// Does not clear anything.
    pub fn check(&self) -> Result<(), Interrupt> {
        if self.is_stopped() {
            Err(Interrupt::Stop)
        } else if self.is_switch_pending() {
            Err(Interrupt::Switch)
        } else {
            Ok(())
        }
    }

    /// Clear the switch flag, returning whether it was set
    pub fn take_switch(&self) -> bool {
        self.flags.switch.swap(false, Ordering::AcqRel)
    }

    /// Sleep for `total` in slices of `poll`, returning early with the
    /// pending interrupt if one shows up.
    pub fn sleep(&self, total: Duration, poll: Duration) -> Result<(), Interrupt> {
        let deadline = Instant::now() + total;
        let poll = poll.max(Duration::from_millis(1));

        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(poll.min(deadline - now));
        }
    }
}

/// Runtime keyboard commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Switch,
}

/// Map a key press to a command. Ctrl-C quits because raw mode swallows SIGINT.
pub fn command_for(key: &KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Quit),
        KeyCode::Char(c) if c.to_ascii_lowercase() == QUIT_KEY => Some(Command::Quit),
        KeyCode::Char(c) if c.to_ascii_lowercase() == SWITCH_KEY => Some(Command::Switch),
        // Russian layout: the same physical keys
        KeyCode::Char('й') | KeyCode::Char('Й') => Some(Command::Quit),
        KeyCode::Char('г') | KeyCode::Char('Г') => Some(Command::Switch),
        _ => None,
    }
}

/// Apply a command to the flags and tell the operator
pub fn apply(command: Command, interrupts: &Interrupts, notifier: &dyn Notify) {
    let text = match command {
        Command::Quit => {
            interrupts.request_stop();
            log::info!("Received shutdown command");
            "🛑 Received shutdown command"
        }
        Command::Switch => {
            interrupts.request_switch();
            log::info!("Received switch-title command");
            "🔄 Received switch-title command"
        }
    };
    if let Err(e) = notifier.send_text(text, false) {
        log::warn!("Could not forward command to Telegram: {}", e);
    }
}

/// Terminal raw mode for the lifetime of the guard
pub(crate) struct RawMode;

impl RawMode {
    pub(crate) fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Background thread turning key presses into interrupts
pub struct KeyboardListener {
    handle: JoinHandle<()>,
}

impl KeyboardListener {
    pub fn spawn(interrupts: Interrupts, notifier: Arc<dyn Notify>) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name("keyboard-listener".to_string())
            .spawn(move || {
                if let Err(e) = listen(&interrupts, notifier.as_ref()) {
                    log::warn!("Keyboard listener stopped: {}", e);
                }
            })?;
        Ok(Self { handle })
    }

    /// Wait for the thread; it exits within one poll once stop is requested
    pub fn join(self) {
        if self.handle.join().is_err() {
            log::warn!("Keyboard listener panicked");
        }
    }
}

fn listen(interrupts: &Interrupts, notifier: &dyn Notify) -> io::Result<()> {
    let _raw = RawMode::enable()?;

    while !interrupts.is_stopped() {
        if !event::poll(KEY_POLL)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if let Some(command) = command_for(&key) {
                apply(command, interrupts, notifier);
            }
        }
    }
    Ok(())
}
