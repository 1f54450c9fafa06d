//! Cache configuration.
//!
//! A [`CacheConfig`] can be built in code or loaded from a YAML file:
//!
//! ```yaml
//! directory: /var/cache/etag
//! max_size: 50MB
//! app_version: 2
//! ```
//!
//! Every field is optional. `max_size` accepts a byte count or a size
//! string (see [`parse_size`]). Changing `app_version` invalidates every
//! entry stored under an older version.

pub mod size;

pub use size::{format_size, parse_size};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::TEN_MB;
use crate::error::{Error, Result};

/// Name of the cache directory created under the system temp directory.
pub const DEFAULT_DIRECTORY_NAME: &str = "etag-cache";

/// Settings for opening an [`crate::EtagCache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the journal and entry files.
    pub directory: PathBuf,

    /// Upper bound on stored bytes before least recently used entries are
    /// evicted.
    #[serde(deserialize_with = "size::deserialize")]
    pub max_size: u64,

    /// Version stamp; a mismatch with the stored journal empties the cache.
    pub app_version: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            max_size: TEN_MB,
            app_version: 1,
        }
    }
}

impl CacheConfig {
    /// Default settings for a cache in `directory`.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_app_version(mut self, app_version: u32) -> Self {
        self.app_version = app_version;
        self
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigNotFound` if the file does not exist and
    /// `ConfigParseError` if it is not valid YAML for this type.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        Self::parse(&content, path)
    }

    /// Parse YAML content; `source_path` is used for error reporting.
    pub fn parse(content: &str, source_path: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| Error::ConfigParseError {
            path: source_path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Check that the settings can open a cache.
    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(Error::ConfigValidationError {
                message: "Cache directory must not be empty".to_string(),
            });
        }
        if self.max_size == 0 {
            return Err(Error::ConfigValidationError {
                message: "Maximum cache size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// `<system temp dir>/etag-cache`.
pub fn default_directory() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_DIRECTORY_NAME)
}
