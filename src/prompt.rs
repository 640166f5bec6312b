//! Interactive console: credentials, reading speed and the key help

use crate::interrupt::{RawMode, QUIT_KEY, SWITCH_KEY};
use crate::models::Credentials;
use crate::pacing::ReadingRate;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::io::{self, BufRead, Write};

/// Read one trimmed line; end of input is an error
fn read_line(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
    }
    Ok(line.trim().to_string())
}

/// Apply one key to the password buffer. `Some(true)` submits, `Some(false)` aborts.
fn edit_secret(buffer: &mut String, code: KeyCode, modifiers: KeyModifiers) -> Option<bool> {
    match code {
        KeyCode::Enter => Some(true),
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(false),
        KeyCode::Backspace => {
            buffer.pop();
            None
        }
        KeyCode::Char(c) => {
            buffer.push(c);
            None
        }
        _ => None,
    }
}

/// Read a password in raw mode, echoing `*` per character
fn read_secret(label: &str) -> io::Result<String> {
    let mut stdout = io::stdout();
    print!("{}", label);
    stdout.flush()?;

    let mut secret = String::new();
    let submitted = {
        let _raw = RawMode::enable()?;
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let before = secret.chars().count();
            if let Some(submitted) = edit_secret(&mut secret, key.code, key.modifiers) {
                break submitted;
            }
            let after = secret.chars().count();
            if after > before {
                print!("*");
            } else if after < before {
                print!("\x08 \x08");
            }
            stdout.flush()?;
        }
    };
    println!();

    if submitted {
        Ok(secret)
    } else {
        Err(io::Error::new(io::ErrorKind::Interrupted, "password entry cancelled"))
    }
}

pub fn credentials() -> io::Result<Credentials> {
    let email = loop {
        let email = read_line("Email: ")?;
        if !email.is_empty() {
            break email;
        }
    };
    let password = read_secret("Password: ")?;
    Ok(Credentials::new(email, password))
}

/// Ask until a speed in range is entered
pub fn reading_rate() -> io::Result<ReadingRate> {
    loop {
        let input = read_line(&format!(
            "Reading speed, chapters per hour ({}-{}): ",
            ReadingRate::MIN,
            ReadingRate::MAX
        ))?;
        match input.parse::<ReadingRate>() {
            Ok(rate) => return Ok(rate),
            Err(e) => println!("{}", e),
        }
    }
}

pub fn print_controls() {
    println!();
    println!("Controls:");
    println!("  {} - switch to another title", SWITCH_KEY.to_ascii_uppercase());
    println!("  {} - quit", QUIT_KEY.to_ascii_uppercase());
    println!();
}
