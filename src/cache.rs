//! In-memory response cache for the HTTP front end.
//!
//! Encoding is the expensive part of serving a thumbnail (and a website
//! capture can take seconds), so encoded responses are kept for a fixed
//! time-to-live and served again for identical requests.
//!
//! ## Cache keys
//!
//! SHA-256 over every request parameter that changes the encoded bytes:
//! source URL, height, width, format, quality and sizing mode. Two requests
//! that differ only in quality never share an entry.
//!
//! ## Expiry
//!
//! Entries expire `ttl` after insertion. There is no size bound and no
//! eviction other than expiry; expired entries are dropped lazily when they
//! are looked up and swept on every insert.
//!
//! Responses that carry a warning (placeholder images, partial captures) are
//! not cached, so a transient failure is retried on the next request.

use crate::imaging::{ImageFormat, Quality};
use crate::transform::SizeMode;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// An encoded response body with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

#[derive(Debug)]
struct CacheEntry {
    response: CachedResponse,
    expires_at: Instant,
}

/// SHA-256 cache key for one request, returned as a hex string.
pub fn cache_key(
    url: &str,
    height: u32,
    width: u32,
    format: ImageFormat,
    quality: Quality,
    mode: SizeMode,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"\0");
    hasher.update(height.to_le_bytes());
    hasher.update(width.to_le_bytes());
    hasher.update(format.canonical_extension().as_bytes());
    hasher.update(b"\0");
    hasher.update(quality.0.to_le_bytes());
    hasher.update(mode.as_str().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
    stats: CacheStats,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Look up `key` as of `now`. An expired entry is removed and reported
    /// as a miss.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<CachedResponse> {
        let fresh = self.entries.get(key).map(|e| e.expires_at > now);
        match fresh {
            Some(true) => {
                self.stats.hit();
                self.entries.get(key).map(|e| e.response.clone())
            }
            Some(false) => {
                self.entries.remove(key);
                self.stats.expire();
                None
            }
            None => {
                self.stats.miss();
                None
            }
        }
    }

    pub fn insert(&mut self, key: String, response: CachedResponse, now: Instant) {
        self.purge_expired(now);
        self.entries.insert(
            key,
            CacheEntry {
                response,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Drop every entry that has expired as of `now`. Returns how many were
    /// removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

/// Summary of cache performance for a server run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub expired: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn expire(&mut self) {
        self.expired += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.expired + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.expired > 0 {
            write!(
                f,
                "{} cached, {} expired, {} rendered ({} total)",
                self.hits,
                self.expired,
                self.misses,
                self.total()
            )
        } else if self.hits > 0 {
            write!(
                f,
                "{} cached, {} rendered ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} rendered", self.misses)
        }
    }
}
