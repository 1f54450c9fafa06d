//! ETag response cache.
//!
//! [`EtagCache`] stores response bodies keyed by request URL together with
//! the ETag they were served with. A request looks up the stored ETag before
//! it is sent, offers it to the server as `If-None-Match`, and reads the body
//! from the cache when the server answers `304 Not Modified`. Fresh `200`
//! responses are copied into the cache while the caller reads them.
//!
//! Every store fault degrades to "not cached": caching can make a request
//! cheaper but never makes it fail.

pub mod key;
pub mod snapshot;
pub mod stats;
pub mod write_through;

pub use key::{derive_key, CacheKey};
pub use snapshot::{CacheSnapshot, CachedBody};
pub use stats::{CacheStats, StatsCounter};
pub use write_through::{AbortHandle, WriteThroughStream};

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::header::ETAG;

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::request::Connection;
use crate::store::{DiskStore, Editor};

/// One mebibyte.
pub const ONE_MB: u64 = 1024 * 1024;

/// Five mebibytes.
pub const FIVE_MB: u64 = 5 * ONE_MB;

/// Ten mebibytes.
pub const TEN_MB: u64 = 10 * ONE_MB;

const ETAG_SLOT: usize = 0;
const BODY_SLOT: usize = 1;
const SLOT_COUNT: usize = 2;

/// Cache of response bodies validated by ETag.
///
/// Cloning is cheap and clones share the store and statistics, so one cache
/// can serve many concurrent requests.
#[derive(Clone)]
pub struct EtagCache {
    store: DiskStore,
    stats: Arc<StatsCounter>,
}

impl EtagCache {
    /// Open a cache in `directory` holding at most `max_size` bytes.
    pub fn open(directory: impl Into<PathBuf>, max_size: u64) -> Result<Self> {
        Self::with_config(&CacheConfig::new(directory).with_max_size(max_size))
    }

    /// Open a cache from a validated configuration.
    pub fn with_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;

        let store = DiskStore::open(
            &config.directory,
            config.app_version,
            SLOT_COUNT,
            config.max_size,
        )
        .map_err(|source| Error::CacheDirectory {
            path: config.directory.clone(),
            source,
        })?;

        Ok(Self {
            store,
            stats: Arc::new(StatsCounter::new()),
        })
    }

    /// Look up the entry for `key`, distinguishing store faults from misses.
    ///
    /// Entries with an empty ETag are reported as absent but left in place.
    pub fn fetch(&self, key: &CacheKey) -> Result<Option<CacheSnapshot>> {
        let Some(mut snapshot) = self.store.get(key.as_str())? else {
            return Ok(None);
        };

        let etag = snapshot.read_string(ETAG_SLOT)?;
        if etag.is_empty() {
            return Ok(None);
        }

        let body_len = snapshot.length(BODY_SLOT);
        Ok(snapshot
            .take_reader(BODY_SLOT)
            .map(|body| CacheSnapshot::new(key.clone(), etag, body, body_len)))
    }

    /// Look up the entry for `key`, treating any store fault as a miss.
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheSnapshot> {
        match self.fetch(key) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!("Cache lookup for {} failed: {}", key, e);
                None
            }
        }
    }

    /// Look up the entry for a connection's target URL.
    pub fn get<C: Connection>(&self, connection: &C) -> Option<CacheSnapshot> {
        let key = derive_key(connection.url())?;
        self.lookup(&key)
    }

    /// Start caching a connection's response body.
    ///
    /// Only `GET` requests answered with `200 OK` are cacheable; for anything
    /// else the stored entry for the target is removed and `None` returned.
    /// Responses without an ETag are passed over without touching the store.
    /// On `None` the connection's body has not been taken and can be read
    /// directly.
    pub fn begin_write<C: Connection>(
        &self,
        connection: &mut C,
    ) -> Option<WriteThroughStream<C::Body>> {
        let key = derive_key(connection.url())?;

        if !is_cacheable(connection) {
            self.remove(&key);
            return None;
        }

        let etag = connection
            .response_header(ETAG.as_str())
            .filter(|etag| !etag.is_empty())?;

        let mut editor = match self.store.edit(key.as_str()) {
            Ok(Some(editor)) => editor,
            Ok(None) => {
                tracing::trace!("Entry {} is already being written; not caching", key);
                return None;
            }
            Err(e) => {
                tracing::debug!("Failed to open cache entry {}: {}", key, e);
                return None;
            }
        };

        let sink = match start_entry(&mut editor, &etag) {
            Ok(sink) => sink,
            Err(e) => {
                tracing::debug!("Failed to write cache entry {}: {}", key, e);
                abort_edit(editor);
                return None;
            }
        };

        match connection.take_body() {
            Ok(body) => Some(WriteThroughStream::new(
                body,
                Box::new(BufWriter::new(sink)),
                editor,
            )),
            Err(e) => {
                tracing::debug!("Response body unavailable for {}: {}", key, e);
                drop(sink);
                abort_edit(editor);
                None
            }
        }
    }

    /// Remove the entry for `key`, ignoring failures.
    pub fn remove(&self, key: &CacheKey) {
        if let Err(e) = self.store.remove(key.as_str()) {
            tracing::debug!("Failed to remove cache entry {}: {}", key, e);
        }
    }

    /// Remove every entry; returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        Ok(self.store.clear()?)
    }

    /// Force pending journal records to disk.
    pub fn flush(&self) -> Result<()> {
        Ok(self.store.flush()?)
    }

    /// Bytes currently stored.
    pub fn size(&self) -> u64 {
        self.store.size()
    }

    /// Upper bound on stored bytes.
    pub fn max_size(&self) -> u64 {
        self.store.max_size()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Directory holding the store files.
    pub fn directory(&self) -> PathBuf {
        self.store.directory()
    }

    /// Responses served from the cache since the last reset.
    pub fn hits(&self) -> u64 {
        self.stats.hits()
    }

    /// `200 OK` responses fetched from the network since the last reset.
    pub fn misses(&self) -> u64 {
        self.stats.misses()
    }

    /// Hits and misses read together.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Zero both counters.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    pub(crate) fn register_hit(&self) {
        self.stats.hit();
    }

    pub(crate) fn register_miss(&self) {
        self.stats.miss();
    }
}

impl std::fmt::Debug for EtagCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtagCache")
            .field("store", &self.store)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

fn is_cacheable<C: Connection>(connection: &mut C) -> bool {
    connection.method() == "GET" && matches!(connection.status(), Ok(200))
}

fn start_entry(editor: &mut Editor, etag: &str) -> io::Result<File> {
    editor.set_value(ETAG_SLOT, etag)?;
    editor.new_output_stream(BODY_SLOT)
}

fn abort_edit(editor: Editor) {
    let key = editor.key().to_string();
    if let Err(e) = editor.abort() {
        tracing::debug!("Failed to abort cache entry {}: {}", key, e);
    }
}
