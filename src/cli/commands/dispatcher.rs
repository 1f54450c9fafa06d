//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use crate::cache::EtagCache;
use crate::cli::args::{Cli, Commands};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command, reporting through `ui`.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    cache: EtagCache,
}

impl CommandDispatcher {
    /// Open the cache described by `config`.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        Ok(Self {
            cache: EtagCache::with_config(config)?,
        })
    }

    /// Get the cache shared by all commands.
    pub fn cache(&self) -> &EtagCache {
        &self.cache
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let result = match &cli.command {
            Commands::Get(args) => {
                let cmd = super::get::GetCommand::new(&self.cache, args.clone());
                cmd.execute(ui)
            }
            Commands::Info(args) => {
                let cmd = super::cache::InfoCommand::new(&self.cache, args.clone());
                cmd.execute(ui)
            }
            Commands::Clear => {
                let cmd = super::cache::ClearCommand::new(&self.cache);
                cmd.execute(ui)
            }
        };

        if let Err(e) = self.cache.flush() {
            tracing::debug!("Failed to flush cache journal: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use clap::Parser;
    use tempfile::TempDir;

    fn dispatcher(temp: &TempDir) -> CommandDispatcher {
        CommandDispatcher::new(&CacheConfig::new(temp.path())).unwrap()
    }

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.success);
        assert_eq!(result.exit_code, 0);
    }

    #[test]
    fn command_result_failure() {
        let result = CommandResult::failure(2);
        assert!(!result.success);
        assert_eq!(result.exit_code, 2);
    }

    #[test]
    fn dispatches_info() {
        let temp = TempDir::new().unwrap();
        let cli = Cli::parse_from(["etag-cache", "info"]);
        let mut ui = MockUI::new();

        let result = dispatcher(&temp).dispatch(&cli, &mut ui).unwrap();
        assert!(result.success);
        assert!(ui.has_message("Entries: 0"));
    }

    #[test]
    fn dispatches_clear() {
        let temp = TempDir::new().unwrap();
        let cli = Cli::parse_from(["etag-cache", "clear"]);
        let mut ui = MockUI::new();

        let result = dispatcher(&temp).dispatch(&cli, &mut ui).unwrap();
        assert!(result.success);
        assert_eq!(ui.successes(), ["Cleared 0 entries"]);
    }

    #[test]
    fn new_fails_for_unusable_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        std::fs::write(&file, "x").unwrap();

        assert!(CommandDispatcher::new(&CacheConfig::new(&file)).is_err());
    }
}
