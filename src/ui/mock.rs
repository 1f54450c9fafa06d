//! Mock UI implementation for testing.
//!
//! `MockUI` implements the `UserInterface` trait and captures everything
//! written to it for later assertion.

use std::io::Write;

use super::{OutputMode, UserInterface};

/// Captures all UI output.
#[derive(Debug, Default)]
pub struct MockUI {
    mode: OutputMode,
    messages: Vec<String>,
    notes: Vec<String>,
    successes: Vec<String>,
    warnings: Vec<String>,
    errors: Vec<String>,
    body: Vec<u8>,
}

impl MockUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn successes(&self) -> &[String] {
        &self.successes
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Bytes written to the body sink.
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Check if any message contains the given substring.
    pub fn has_message(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }
}

impl UserInterface for MockUI {
    fn output_mode(&self) -> OutputMode {
        self.mode
    }

    fn message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn note(&mut self, msg: &str) {
        self.notes.push(msg.to_string());
    }

    fn success(&mut self, msg: &str) {
        self.successes.push(msg.to_string());
    }

    fn warning(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.errors.push(msg.to_string());
    }

    fn body(&mut self) -> &mut dyn Write {
        &mut self.body
    }
}
