//! Cache key generation for stored entries.

use sha2::{Digest, Sha256};

use crate::message::CacheRequest;

/// Compute the cache key identifying a request within a store.
pub fn compute_cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cache key for a request.
pub fn request_key(request: &CacheRequest) -> String {
    compute_cache_key(request.method().as_str(), request.url().as_str())
}
