//! Cached responses handed out by lookups.

use std::fs::File;
use std::io::{self, BufReader, Read};

use super::CacheKey;

/// A cached validator and the body stored with it.
///
/// Holds the body file open until [`CacheSnapshot::close`] is called, the
/// body is taken with [`CacheSnapshot::into_body`], or the snapshot is
/// dropped. Closing more than once is a no-op.
#[derive(Debug)]
pub struct CacheSnapshot {
    key: CacheKey,
    etag: String,
    body: Option<File>,
    body_len: u64,
}

impl CacheSnapshot {
    pub(crate) fn new(key: CacheKey, etag: String, body: File, body_len: u64) -> Self {
        Self {
            key,
            etag,
            body: Some(body),
            body_len,
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// The stored ETag, never empty.
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Length of the stored body in bytes.
    pub fn body_len(&self) -> u64 {
        self.body_len
    }

    /// Whether the body is still available.
    pub fn is_open(&self) -> bool {
        self.body.is_some()
    }

    /// Release the body file.
    pub fn close(&mut self) {
        self.body = None;
    }

    /// Turn the snapshot into a readable body.
    ///
    /// Returns `None` if the snapshot was already closed.
    pub fn into_body(mut self) -> Option<CachedBody> {
        let file = self.body.take()?;
        Some(CachedBody {
            reader: BufReader::new(file),
            len: self.body_len,
        })
    }
}

/// Body stream of a cache hit.
#[derive(Debug)]
pub struct CachedBody {
    reader: BufReader<File>,
    len: u64,
}

impl CachedBody {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Read for CachedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}
