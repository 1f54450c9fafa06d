//! Conditional requests backed by an [`EtagCache`].
//!
//! A [`CacheRequest`] owns one HTTP exchange. Before the request goes out it
//! looks up the cached entry for the target and, if there is one, offers its
//! ETag as `If-None-Match`. The response then takes one of three paths:
//!
//! - **Hit**: `304 Not Modified` with a retained entry. The body is served
//!   from the cache and [`CacheRequest::code`] reports `200`.
//! - **Miss**: `200 OK`. The body is streamed to the caller and copied into
//!   the cache on the way.
//! - **Pass-through**: anything else. The network body is returned as is.

pub mod body;
pub mod connection;
pub mod http;
#[cfg(test)]
pub(crate) mod testing;

pub use body::ResponseBody;
pub use connection::Connection;
pub use http::HttpConnection;

use std::io::Read;

use reqwest::header::{ETAG, IF_NONE_MATCH};

use crate::cache::{derive_key, AbortHandle, CacheSnapshot, EtagCache};
use crate::error::{Error, Result};

const OK: u16 = 200;
const NOT_MODIFIED: u16 = 304;

/// An HTTP request that revalidates against, and fills, an [`EtagCache`].
pub struct CacheRequest<C: Connection = HttpConnection> {
    connection: C,
    cache: EtagCache,
    snapshot: Option<CacheSnapshot>,
    offered_etag: Option<String>,
    prepared: bool,
    body_taken: bool,
    cached: bool,
    pending: Option<AbortHandle>,
}

impl CacheRequest<HttpConnection> {
    /// Prepare a `GET` request for `url` through `cache`.
    pub fn get(url: &str, cache: &EtagCache) -> Result<Self> {
        Ok(Self::new(HttpConnection::get(url)?, cache))
    }

    /// Prepare a request with an arbitrary method.
    pub fn with_method(method: &str, url: &str, cache: &EtagCache) -> Result<Self> {
        Ok(Self::new(HttpConnection::new(method, url)?, cache))
    }
}

impl<C: Connection> CacheRequest<C> {
    /// Wrap an unsent connection.
    pub fn new(connection: C, cache: &EtagCache) -> Self {
        Self {
            connection,
            cache: cache.clone(),
            snapshot: None,
            offered_etag: None,
            prepared: false,
            body_taken: false,
            cached: false,
            pending: None,
        }
    }

    pub fn url(&self) -> &str {
        self.connection.url()
    }

    pub fn method(&self) -> &str {
        self.connection.method()
    }

    /// Set a request header.
    pub fn header(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        self.connection.set_header(name, value)?;
        Ok(self)
    }

    /// Attach `If-None-Match` from the cached entry, at most once.
    fn prepare(&mut self) {
        if self.prepared {
            return;
        }
        self.prepared = true;

        let Some(snapshot) = self.cache.get(&self.connection) else {
            return;
        };
        match self
            .connection
            .set_header(IF_NONE_MATCH.as_str(), snapshot.etag())
        {
            Ok(()) => {
                tracing::trace!("Revalidating {} with ETag {}", self.url(), snapshot.etag());
                self.offered_etag = Some(snapshot.etag().to_string());
                self.snapshot = Some(snapshot);
            }
            Err(e) => tracing::debug!("Could not attach If-None-Match: {}", e),
        }
    }

    /// Send the request if needed and return the status the server sent.
    pub fn raw_code(&mut self) -> Result<u16> {
        self.prepare();
        match self.connection.status() {
            Ok(code) => Ok(code),
            Err(e) => {
                self.release_snapshot();
                Err(e)
            }
        }
    }

    /// Send the request if needed and return the status code.
    ///
    /// A `304 Not Modified` answering our cached ETag is reported as `200`,
    /// since the body will be served from the cache.
    pub fn code(&mut self) -> Result<u16> {
        let code = self.raw_code()?;
        if code == NOT_MODIFIED && (self.snapshot.is_some() || self.cached) {
            return Ok(OK);
        }
        self.release_snapshot();
        Ok(code)
    }

    /// Whether [`CacheRequest::code`] is `200`.
    pub fn ok(&mut self) -> Result<bool> {
        Ok(self.code()? == OK)
    }

    /// Whether the server answered `304 Not Modified`.
    pub fn not_modified(&mut self) -> Result<bool> {
        Ok(self.raw_code()? == NOT_MODIFIED)
    }

    /// Take the response body.
    ///
    /// Can be called once; later calls fail with [`Error::BodyConsumed`].
    pub fn stream(&mut self) -> Result<ResponseBody<C::Body>> {
        if self.body_taken {
            return Err(Error::BodyConsumed);
        }
        let code = self.raw_code()?;
        self.body_taken = true;

        if code == NOT_MODIFIED {
            if let Some(body) = self.snapshot.take().and_then(CacheSnapshot::into_body) {
                tracing::trace!("Cache hit for {}", self.url());
                self.cache.register_hit();
                self.cached = true;
                return Ok(ResponseBody::Cached(body));
            }
        }
        self.release_snapshot();

        if code == OK {
            tracing::trace!("Cache miss for {}", self.url());
            self.cache.register_miss();
            if let Some(stream) = self.cache.begin_write(&mut self.connection) {
                self.pending = Some(stream.abort_handle());
                return Ok(ResponseBody::WriteThrough(stream));
            }
        } else if code != NOT_MODIFIED {
            if let Some(key) = derive_key(self.url()) {
                self.cache.remove(&key);
            }
        }

        Ok(ResponseBody::Network(self.connection.take_body()?))
    }

    /// Read the whole body as bytes.
    pub fn bytes(&mut self) -> Result<Vec<u8>> {
        let mut body = self.stream()?;
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)?;
        body.close();
        Ok(bytes)
    }

    /// Read the whole body as UTF-8 text.
    pub fn body(&mut self) -> Result<String> {
        let mut body = self.stream()?;
        let mut text = String::new();
        body.read_to_string(&mut text)?;
        body.close();
        Ok(text)
    }

    /// Whether the body was served from the cache.
    pub fn cached(&self) -> bool {
        self.cached
    }

    /// A response header, or `None` before the request was sent.
    pub fn response_header(&self, name: &str) -> Option<String> {
        self.connection.response_header(name)
    }

    /// The ETag of the response, falling back to the cached one on a hit.
    pub fn etag(&self) -> Option<String> {
        self.response_header(ETAG.as_str()).or_else(|| {
            if self.cached {
                self.offered_etag.clone()
            } else {
                None
            }
        })
    }

    /// Release the cached entry, abort any cache write in progress and close
    /// the connection.
    pub fn disconnect(&mut self) {
        self.release_snapshot();
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.connection.disconnect();
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    fn release_snapshot(&mut self) {
        if let Some(mut snapshot) = self.snapshot.take() {
            snapshot.close();
        }
    }
}

impl<C: Connection> std::fmt::Debug for CacheRequest<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRequest")
            .field("method", &self.method())
            .field("url", &self.url())
            .field("revalidating", &self.snapshot.is_some())
            .field("cached", &self.cached)
            .finish()
    }
}
