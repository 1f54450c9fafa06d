//! Error types for etag-cache operations.
//!
//! This module defines [`Error`], the error type returned by the public API,
//! and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Cache store faults never reach callers of a request; they degrade to an
//!   uncached exchange and are logged. The variants here cover what does
//!   surface: construction problems, transport failures and misuse.
//! - Use `anyhow::Error` (via `Error::Other`) for unexpected errors in the CLI

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for etag-cache operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The cache directory could not be created or opened.
    #[error("Cache directory unusable at {path}: {source}")]
    CacheDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file not found at the given path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse a configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// The request target is not a usable URL.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// The request method is not a valid HTTP token.
    #[error("Invalid HTTP method: {method}")]
    InvalidMethod { method: String },

    /// A request header name or value is not valid HTTP.
    #[error("Invalid request header '{name}'")]
    InvalidHeader { name: String },

    /// Request headers were modified after the request went out.
    #[error("Request already sent; headers can no longer be changed")]
    RequestSent,

    /// The response body stream was already handed out.
    #[error("Response body already consumed")]
    BodyConsumed,

    /// Transport failure from the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for etag-cache operations.
pub type Result<T> = std::result::Result<T, Error>;
