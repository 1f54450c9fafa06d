//! Terminal implementation of [`UserInterface`].

use std::io::{self, Write};

use console::style;

use super::{OutputMode, UserInterface};

/// Writes command output to stdout and status lines to stderr.
pub struct TerminalUI {
    mode: OutputMode,
    stdout: io::Stdout,
}

impl TerminalUI {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            stdout: io::stdout(),
        }
    }
}

impl UserInterface for TerminalUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        println!("{}", msg);
    }

    fn note(&mut self, msg: &str) {
        if self.mode.shows_status() {
            eprintln!("{}", style(msg).dim());
        }
    }

    fn success(&mut self, msg: &str) {
        if self.mode.shows_status() {
            eprintln!("{} {}", style("✓").green(), msg);
        }
    }

    fn warning(&mut self, msg: &str) {
        if self.mode.shows_status() {
            eprintln!("{} {}", style("⚠").yellow(), msg);
        }
    }

    fn error(&mut self, msg: &str) {
        eprintln!("{} {}", style("✗").red(), msg);
    }

    fn body(&mut self) -> &mut dyn Write {
        &mut self.stdout
    }
}
