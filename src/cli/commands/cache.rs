//! Cache inspection commands.
//!
//! Provides `etag-cache info` and `etag-cache clear`.

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use crate::cache::EtagCache;
use crate::cli::args::InfoArgs;
use crate::config::format_size;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};

/// Cache usage as reported by `info --json`.
#[derive(Debug, Serialize)]
pub struct CacheInfo {
    pub directory: PathBuf,
    pub entries: usize,
    pub size: u64,
    pub max_size: u64,
}

impl CacheInfo {
    pub fn of(cache: &EtagCache) -> Self {
        Self {
            directory: cache.directory(),
            entries: cache.len(),
            size: cache.size(),
            max_size: cache.max_size(),
        }
    }
}

/// The `info` command implementation.
pub struct InfoCommand {
    cache: EtagCache,
    args: InfoArgs,
}

impl InfoCommand {
    pub fn new(cache: &EtagCache, args: InfoArgs) -> Self {
        Self {
            cache: cache.clone(),
            args,
        }
    }
}

impl Command for InfoCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> crate::error::Result<CommandResult> {
        show_info(&self.cache, self.args.json, ui)?;
        Ok(CommandResult::success())
    }
}

fn show_info(cache: &EtagCache, json: bool, ui: &mut dyn UserInterface) -> Result<()> {
    let info = CacheInfo::of(cache);

    if json {
        ui.message(&serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    ui.message(&format!("Location: {}", info.directory.display()));
    ui.message(&format!("Entries: {}", info.entries));
    ui.message(&format!(
        "Size: {} of {}",
        format_size(info.size),
        format_size(info.max_size)
    ));
    Ok(())
}

/// The `clear` command implementation.
pub struct ClearCommand {
    cache: EtagCache,
}

impl ClearCommand {
    pub fn new(cache: &EtagCache) -> Self {
        Self {
            cache: cache.clone(),
        }
    }
}

impl Command for ClearCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> crate::error::Result<CommandResult> {
        let cleared = self.cache.clear()?;
        ui.success(&format!("Cleared {} entries", cleared));
        Ok(CommandResult::success())
    }
}
