//! Hit/miss accounting.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Requests that reached a hit or miss outcome.
    pub fn total(&self) -> u64 {
        self.hits + self.misses
    }
}

/// Shared hit/miss counters.
///
/// Both counters sit behind one lock, so [`StatsCounter::reset`] and
/// [`StatsCounter::snapshot`] never observe one counter updated without the
/// other.
#[derive(Debug, Default)]
pub struct StatsCounter {
    counts: Mutex<CacheStats>,
}

impl StatsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.counts().hits += 1;
    }

    pub fn miss(&self) {
        self.counts().misses += 1;
    }

    pub fn reset(&self) {
        *self.counts() = CacheStats::default();
    }

    pub fn hits(&self) -> u64 {
        self.counts().hits
    }

    pub fn misses(&self) -> u64 {
        self.counts().misses
    }

    pub fn snapshot(&self) -> CacheStats {
        *self.counts()
    }

    fn counts(&self) -> MutexGuard<'_, CacheStats> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
