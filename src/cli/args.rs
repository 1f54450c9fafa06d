//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{parse_size, CacheConfig};
use crate::error::Result;

/// etag-cache - Fetch URLs through a conditional-GET disk cache.
#[derive(Debug, Parser)]
#[command(name = "etag-cache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Cache directory (defaults to <temp>/etag-cache)
    #[arg(long, global = true, env = "ETAG_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum cache size, e.g. 10MB or 512KB
    #[arg(long, global = true, value_parser = parse_size_arg)]
    pub max_size: Option<u64>,

    /// Path to a YAML cache config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolve the cache configuration.
    ///
    /// Starts from the config file when one is given, then applies
    /// `--cache-dir` and `--max-size`.
    pub fn cache_config(&self) -> Result<CacheConfig> {
        let mut config = match &self.config {
            Some(path) => CacheConfig::load(path)?,
            None => CacheConfig::default(),
        };
        if let Some(directory) = &self.cache_dir {
            config.directory = directory.clone();
        }
        if let Some(max_size) = self.max_size {
            config.max_size = max_size;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_size_arg(value: &str) -> std::result::Result<u64, String> {
    parse_size(value).map_err(|e| e.to_string())
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch URLs through the cache
    Get(GetArgs),

    /// Show cache location and usage
    Info(InfoArgs),

    /// Remove every cached entry
    Clear,
}

/// Arguments for the `get` command.
#[derive(Debug, Clone, Args)]
pub struct GetArgs {
    /// URLs to fetch
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Write bodies to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the fetch report as JSON
    #[arg(long)]
    pub json: bool,

    /// Extra request header, e.g. "Accept: text/plain"
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,
}

/// Arguments for the `info` command.
#[derive(Debug, Clone, Args)]
pub struct InfoArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_get_with_options() {
        let cli = Cli::try_parse_from([
            "etag-cache",
            "get",
            "http://localhost/a",
            "http://localhost/b",
            "-o",
            "out.txt",
            "-H",
            "Accept: text/plain",
            "--json",
        ])
        .unwrap();

        let Commands::Get(args) = cli.command else {
            panic!("expected get");
        };
        assert_eq!(args.urls.len(), 2);
        assert_eq!(args.output, Some(PathBuf::from("out.txt")));
        assert_eq!(args.headers, ["Accept: text/plain"]);
        assert!(args.json);
    }

    #[test]
    fn get_requires_a_url() {
        assert!(Cli::try_parse_from(["etag-cache", "get"]).is_err());
    }

    #[test]
    fn parses_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "etag-cache",
            "info",
            "--cache-dir",
            "/tmp/cache",
            "--max-size",
            "5MB",
        ])
        .unwrap();

        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert_eq!(cli.max_size, Some(5 * 1024 * 1024));
    }

    #[test]
    fn rejects_bad_max_size() {
        assert!(Cli::try_parse_from(["etag-cache", "info", "--max-size", "huge"]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.yml");
        std::fs::write(&path, "directory: /from/file\nmax_size: 1MB\napp_version: 4\n").unwrap();

        let cli = Cli::try_parse_from([
            "etag-cache",
            "clear",
            "--config",
            path.to_str().unwrap(),
            "--max-size",
            "2MB",
        ])
        .unwrap();
        let config = cli.cache_config().unwrap();

        assert_eq!(config.directory, PathBuf::from("/from/file"));
        assert_eq!(config.max_size, 2 * 1024 * 1024);
        assert_eq!(config.app_version, 4);
    }

    #[test]
    fn zero_max_size_is_rejected() {
        let cli = Cli::try_parse_from(["etag-cache", "clear", "--max-size", "0"]).unwrap();
        assert!(cli.cache_config().is_err());
    }
}
