//! Uniform body stream handed to callers.

use std::io::{self, Read};

use crate::cache::{CachedBody, WriteThroughStream};

/// Response body of a [`super::CacheRequest`], whichever path produced it.
#[derive(Debug)]
pub enum ResponseBody<B> {
    /// Served from the cache after a `304 Not Modified`.
    Cached(CachedBody),
    /// Fresh body being copied into the cache as it is read.
    WriteThrough(WriteThroughStream<B>),
    /// Body read straight from the network, not cached.
    Network(B),
}

impl<B> ResponseBody<B> {
    /// Whether the body comes from the cache.
    pub fn is_cached(&self) -> bool {
        matches!(self, ResponseBody::Cached(_))
    }

    /// Whether the body is being written to the cache.
    pub fn is_caching(&self) -> bool {
        matches!(self, ResponseBody::WriteThrough(stream) if stream.is_pending())
    }

    /// Release the body, committing a fully read cache write.
    pub fn close(self) {
        if let ResponseBody::WriteThrough(mut stream) = self {
            stream.close();
        }
    }
}

impl<B: Read> Read for ResponseBody<B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ResponseBody::Cached(body) => body.read(buf),
            ResponseBody::WriteThrough(stream) => stream.read(buf),
            ResponseBody::Network(body) => body.read(buf),
        }
    }
}
