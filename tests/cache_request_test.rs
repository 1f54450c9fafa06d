//! Conditional request scenarios against a local HTTP server.

use std::io::Read;

use etag_cache::{derive_key, CacheRequest, EtagCache, ONE_MB};
use httpmock::prelude::*;
use httpmock::Mock;
use tempfile::TempDir;

fn serve_fresh(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/resource");
        then.status(200).header("ETag", "1234").body("hello");
    })
}

fn serve_not_modified(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(GET)
            .path("/resource")
            .header("if-none-match", "1234");
        then.status(304).header("ETag", "1234");
    })
}

/// Fetch `url` once so the cache holds an entry for it.
fn warm(url: &str, cache: &EtagCache) {
    let mut request = CacheRequest::get(url, cache).unwrap();
    assert_eq!(request.body().unwrap(), "hello");
}

#[test]
fn cached_request() {
    let server = MockServer::start();
    let mut fresh = serve_fresh(&server);
    let temp = TempDir::new().unwrap();
    let cache = EtagCache::open(temp.path(), ONE_MB).unwrap();
    let url = server.url("/resource");

    assert_eq!(cache.hits(), 0);
    assert_eq!(cache.misses(), 0);

    let mut request = CacheRequest::get(&url, &cache).unwrap();
    assert!(cache.get(request.connection()).is_none());
    assert!(request.ok().unwrap());
    assert_eq!(request.body().unwrap(), "hello");
    assert!(!request.cached());
    assert_eq!(cache.hits(), 0);
    assert_eq!(cache.misses(), 1);

    fresh.delete();
    let revalidated = serve_not_modified(&server);

    let mut request = CacheRequest::get(&url, &cache).unwrap();
    assert!(request.ok().unwrap());
    assert_eq!(request.code().unwrap(), 200);
    assert_eq!(request.raw_code().unwrap(), 304);
    assert_eq!(request.body().unwrap(), "hello");
    assert!(request.cached());
    assert!(cache.get(request.connection()).is_some());
    assert_eq!(cache.hits(), 1);
    assert_eq!(cache.misses(), 1);
    revalidated.assert();
}

#[test]
fn gzip_body_is_decoded_before_caching() {
    const GZIPPED_HELLO: [u8; 26] = [
        0x1F, 0x8B, 0x08, 0x00, 0xFA, 0x3D, 0xFF, 0x50, 0x00, 0x03, 0xCB, 0x48, 0xCD, 0xC9, 0xC9,
        0xE7, 0x02, 0x00, 0x20, 0x30, 0x3A, 0x36, 0x06, 0x00, 0x00, 0x00,
    ];
    let server = MockServer::start();
    let mut fresh = server.mock(|when, then| {
        when.method(GET)
            .path("/resource")
            .header("accept-encoding", "gzip");
        then.status(200)
            .header("ETag", "1234")
            .header("Content-Encoding", "gzip")
            .body(GZIPPED_HELLO);
    });
    let temp = TempDir::new().unwrap();
    let url = server.url("/resource");

    {
        let cache = EtagCache::open(temp.path(), ONE_MB).unwrap();
        let mut request = CacheRequest::get(&url, &cache).unwrap();
        request.header("Accept-Encoding", "gzip").unwrap();
        assert!(request.ok().unwrap());
        assert_eq!(request.body().unwrap(), "hello\n");
        assert!(!request.cached());
        assert_eq!(cache.misses(), 1);
        cache.flush().unwrap();
    }
    fresh.assert();
    fresh.delete();
    let revalidated = serve_not_modified(&server);

    let cache = EtagCache::open(temp.path(), ONE_MB).unwrap();
    let mut request = CacheRequest::get(&url, &cache).unwrap();
    request.header("Accept-Encoding", "gzip").unwrap();
    assert!(request.ok().unwrap());
    assert_eq!(request.body().unwrap(), "hello\n");
    assert!(request.cached());
    assert_eq!(cache.hits(), 1);
    assert_eq!(cache.misses(), 0);
    revalidated.assert();
}

#[test]
fn etag_ignored() {
    let server = MockServer::start();
    let fresh = serve_fresh(&server);
    let temp = TempDir::new().unwrap();
    let cache = EtagCache::open(temp.path(), ONE_MB).unwrap();
    let url = server.url("/resource");

    let mut request = CacheRequest::get(&url, &cache).unwrap();
    assert!(cache.get(request.connection()).is_none());
    assert!(request.ok().unwrap());
    assert_eq!(request.body().unwrap(), "hello");
    assert!(!request.cached());

    let mut request = CacheRequest::get(&url, &cache).unwrap();
    assert!(request.ok().unwrap());
    assert_eq!(request.body().unwrap(), "hello");
    assert!(!request.cached());
    assert!(cache.get(request.connection()).is_some());

    assert_eq!(cache.hits(), 0);
    assert_eq!(cache.misses(), 2);
    assert_eq!(cache.len(), 1);
    fresh.assert_calls(2);
}

#[test]
fn reset_stats() {
    let server = MockServer::start();
    let mut fresh = serve_fresh(&server);
    let temp = TempDir::new().unwrap();
    let cache = EtagCache::open(temp.path(), ONE_MB).unwrap();
    let url = server.url("/resource");

    warm(&url, &cache);
    fresh.delete();
    serve_not_modified(&server);

    let mut request = CacheRequest::get(&url, &cache).unwrap();
    assert_eq!(request.body().unwrap(), "hello");
    assert!(request.cached());
    assert_eq!(cache.hits(), 1);
    assert_eq!(cache.misses(), 1);

    cache.reset_stats();
    assert_eq!(cache.hits(), 0);
    assert_eq!(cache.misses(), 0);
}

#[test]
fn entries_survive_reopen() {
    let server = MockServer::start();
    let mut fresh = serve_fresh(&server);
    let temp = TempDir::new().unwrap();
    let url = server.url("/resource");

    {
        let cache = EtagCache::open(temp.path(), ONE_MB).unwrap();
        warm(&url, &cache);
        assert_eq!(cache.misses(), 1);
    }
    fresh.delete();
    serve_not_modified(&server);

    let cache = EtagCache::open(temp.path(), ONE_MB).unwrap();
    assert_eq!(cache.hits(), 0);
    assert_eq!(cache.misses(), 0);

    let mut request = CacheRequest::get(&url, &cache).unwrap();
    assert!(request.ok().unwrap());
    assert_eq!(request.body().unwrap(), "hello");
    assert!(request.cached());
    assert_eq!(cache.hits(), 1);
    assert_eq!(cache.misses(), 0);
}

#[test]
fn error_response_removes_entry() {
    let server = MockServer::start();
    let mut fresh = serve_fresh(&server);
    let temp = TempDir::new().unwrap();
    let cache = EtagCache::open(temp.path(), ONE_MB).unwrap();
    let url = server.url("/resource");

    warm(&url, &cache);
    fresh.delete();
    server.mock(|when, then| {
        when.method(GET).path("/resource");
        then.status(500).body("boom");
    });

    let mut request = CacheRequest::get(&url, &cache).unwrap();
    assert_eq!(request.code().unwrap(), 500);
    assert_eq!(request.body().unwrap(), "boom");
    assert!(!request.cached());

    assert!(cache.lookup(&derive_key(&url).unwrap()).is_none());
    assert_eq!(cache.misses(), 1);
}

#[test]
fn post_is_not_cached() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/resource");
        then.status(200).header("ETag", "1234").body("created");
    });
    let temp = TempDir::new().unwrap();
    let cache = EtagCache::open(temp.path(), ONE_MB).unwrap();

    let mut request =
        CacheRequest::with_method("POST", &server.url("/resource"), &cache).unwrap();
    assert_eq!(request.body().unwrap(), "created");

    assert!(cache.is_empty());
    assert_eq!(cache.misses(), 1);
}

#[test]
fn response_without_etag_is_not_cached() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/plain");
        then.status(200).body("plain");
    });
    let temp = TempDir::new().unwrap();
    let cache = EtagCache::open(temp.path(), ONE_MB).unwrap();

    let mut request = CacheRequest::get(&server.url("/plain"), &cache).unwrap();
    assert_eq!(request.body().unwrap(), "plain");
    assert!(cache.is_empty());
}

#[test]
fn partially_read_body_is_discarded() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/resource");
        then.status(200).header("ETag", "1234").body("hello world");
    });
    let temp = TempDir::new().unwrap();
    let cache = EtagCache::open(temp.path(), ONE_MB).unwrap();
    let url = server.url("/resource");

    let mut request = CacheRequest::get(&url, &cache).unwrap();
    let mut body = request.stream().unwrap();
    let mut partial = [0u8; 5];
    body.read_exact(&mut partial).unwrap();
    body.close();

    assert!(cache.lookup(&derive_key(&url).unwrap()).is_none());
}

#[test]
fn disconnect_discards_pending_write() {
    let server = MockServer::start();
    serve_fresh(&server);
    let temp = TempDir::new().unwrap();
    let cache = EtagCache::open(temp.path(), ONE_MB).unwrap();
    let url = server.url("/resource");

    let mut request = CacheRequest::get(&url, &cache).unwrap();
    let mut body = request.stream().unwrap();
    request.disconnect();

    let mut text = String::new();
    body.read_to_string(&mut text).unwrap();
    body.close();

    assert_eq!(text, "hello");
    assert!(cache.lookup(&derive_key(&url).unwrap()).is_none());
}

#[test]
fn eviction_keeps_cache_within_bound() {
    let server = MockServer::start();
    for path in ["/a", "/b", "/c"] {
        server.mock(|when, then| {
            when.method(GET).path(path);
            then.status(200).header("ETag", "1").body("0123456789");
        });
    }
    let temp = TempDir::new().unwrap();
    // Each entry stores one byte of ETag and ten bytes of body.
    let cache = EtagCache::open(temp.path(), 25).unwrap();

    for path in ["/a", "/b", "/c"] {
        let mut request = CacheRequest::get(&server.url(path), &cache).unwrap();
        request.body().unwrap();
    }

    assert!(cache.size() <= 25);
    assert_eq!(cache.len(), 2);
    assert!(cache
        .lookup(&derive_key(&server.url("/a")).unwrap())
        .is_none());
    assert!(cache
        .lookup(&derive_key(&server.url("/c")).unwrap())
        .is_some());
}
