//! Cache key derivation.

use reqwest::Url;
use sha1::{Digest, Sha1};
use std::fmt;

/// Store key for one request target: the lowercase hex SHA-1 of the
/// target's canonical URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Number of hex characters in every key.
    pub const LENGTH: usize = 40;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_canonical(canonical: &str) -> Self {
        Self(hex::encode(Sha1::digest(canonical.as_bytes())))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the cache key for a request URL.
///
/// Returns `None` when the URL does not parse or is not `http`/`https`;
/// only targets that can answer a conditional GET are cacheable.
pub fn derive_key(url: &str) -> Option<CacheKey> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    Some(CacheKey::from_canonical(parsed.as_str()))
}
