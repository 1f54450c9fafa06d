//! etag-cache - Conditional-GET HTTP client cache.
//!
//! Requests made through a [`CacheRequest`] offer the ETag of the last
//! stored response as `If-None-Match`. When the server answers
//! `304 Not Modified` the body is served from a size-bounded disk cache;
//! fresh `200` responses are copied into the cache while they are read.
//!
//! # Modules
//!
//! - [`cache`] - ETag cache facade, key derivation, write-through streams
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Cache configuration and size parsing
//! - [`error`] - Error types and result aliases
//! - [`request`] - Conditional requests and the transport seam
//! - [`store`] - Journaled LRU disk store
//! - [`ui`] - Terminal output for the CLI
//!
//! # Example
//!
//! ```
//! use etag_cache::{derive_key, EtagCache, ONE_MB};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let cache = EtagCache::open(dir.path(), ONE_MB).unwrap();
//!
//! let key = derive_key("https://example.com/resource").unwrap();
//! assert_eq!(key.as_str().len(), 40);
//! assert!(cache.lookup(&key).is_none());
//! ```
//!
//! For requests against a live server, see the integration tests.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod request;
pub mod store;
pub mod ui;

pub use cache::{
    derive_key, CacheKey, CacheSnapshot, CacheStats, EtagCache, FIVE_MB, ONE_MB, TEN_MB,
};
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use request::{CacheRequest, Connection, HttpConnection, ResponseBody};
