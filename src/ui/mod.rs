//! Terminal output for the command-line interface.
//!
//! Commands write through the [`UserInterface`] trait so tests can capture
//! what they print. Data meant for pipes (response bodies, `info` output)
//! goes to stdout; status lines go to stderr.
//!
//! # Example
//!
//! ```
//! use etag_cache::ui::{MockUI, UserInterface};
//!
//! let mut ui = MockUI::new();
//! ui.success("Cleared 3 entries");
//! assert!(ui.successes().contains(&"Cleared 3 entries".to_string()));
//! ```

pub mod mock;
pub mod terminal;

pub use mock::MockUI;
pub use terminal::TerminalUI;

use std::io::Write;

/// How much status output to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Show status lines.
    #[default]
    Normal,
    /// Show only errors.
    Quiet,
}

impl OutputMode {
    /// Whether non-error status lines are printed.
    pub fn shows_status(&self) -> bool {
        matches!(self, OutputMode::Normal)
    }
}

/// Output sink for commands.
pub trait UserInterface {
    fn output_mode(&self) -> OutputMode;

    /// Print a line of command output.
    fn message(&mut self, msg: &str);

    /// Print a neutral status line.
    fn note(&mut self, msg: &str);

    /// Print a success status line.
    fn success(&mut self, msg: &str);

    /// Print a warning.
    fn warning(&mut self, msg: &str);

    /// Print an error. Shown in every mode.
    fn error(&mut self, msg: &str);

    /// Raw sink for response bodies.
    fn body(&mut self) -> &mut dyn Write;
}
