//! Operator confirmation prompts.

use crate::error::Result;
use crate::migration::ConfirmationPrompt;
use std::io::{stdin, stdout, IsTerminal, Write};

/// Environment variable that forces non-interactive mode.
pub const NON_INTERACTIVE_ENV: &str = "BREWCTL_NON_INTERACTIVE";

/// Check if running in interactive TTY
pub fn is_interactive() -> bool {
    if std::env::var_os(NON_INTERACTIVE_ENV).is_some() {
        return false;
    }
    // Cargo test binaries run from target/*/deps/ and are never interactive
    if let Ok(exe) = std::env::current_exe() {
        if let Some(path) = exe.to_str() {
            if path.contains("/deps/") || path.contains("\\deps\\") {
                return false;
            }
        }
    }
    stdin().is_terminal() && stdout().is_terminal()
}

/// Asks on the terminal. Without a TTY every question is declined.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        Self
    }
}

impl ConfirmationPrompt for TerminalPrompt {
    fn ask(&self, message: &str) -> Result<bool> {
        if !is_interactive() {
            tracing::warn!("{} [y/N] declined (not running interactively)", message);
            return Ok(false);
        }

        print!("{} [y/N] ", message);
        stdout().flush().ok();

        loop {
            use crossterm::event::{read, Event, KeyCode, KeyEvent};

            if let Event::Key(KeyEvent { code, .. }) = read()? {
                match code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => {
                        println!("y");
                        return Ok(true);
                    }
                    KeyCode::Char('n')
                    | KeyCode::Char('N')
                    | KeyCode::Enter
                    | KeyCode::Esc
                    | KeyCode::Char('q') => {
                        println!("n");
                        return Ok(false);
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Answers every question with yes (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl ConfirmationPrompt for AssumeYes {
    fn ask(&self, message: &str) -> Result<bool> {
        tracing::info!("{} [y/N] y (--yes)", message);
        Ok(true)
    }
}
