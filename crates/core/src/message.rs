//! Request and response types shared by the controller, the storage
//! backends and the network.

use std::hash::{Hash, Hasher};

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// A request identified by method and URL.
///
/// Fragments never take part in identity and are stripped on construction.
/// A body can ride along on pass-through requests; it is sent to the network
/// but is not part of identity and is never stored.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    method: Method,
    url: Url,
    body: Bytes,
}

impl PartialEq for CacheRequest {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method && self.url == other.url
    }
}

impl Eq for CacheRequest {}

impl Hash for CacheRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.url.hash(state);
    }
}

impl CacheRequest {
    pub fn new(method: Method, mut url: Url) -> Self {
        url.set_fragment(None);
        Self { method, url, body: Bytes::new() }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Whether this request uses a retrieval method and may be cached.
    pub fn is_retrieval(&self) -> bool {
        is_retrieval(&self.method)
    }
}

/// Only GET is treated as a retrieval method.
pub fn is_retrieval(method: &Method) -> bool {
    *method == Method::GET
}

/// How the network should treat intermediary caches for a fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    #[default]
    Default,
    /// Force a fresh fetch, bypassing any HTTP cache on the way.
    Reload,
}

/// A response as it is returned to callers and kept in cache stores.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl StoredResponse {
    pub fn new(url: Url, status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self { url, status, headers, body: body.into() }
    }

    /// Whether the status is in the 2xx range.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Check that the response may be written to a cache store.
    ///
    /// Partial content and `Vary: *` responses are rejected.
    pub fn ensure_storable(&self) -> Result<(), Error> {
        if self.status == StatusCode::PARTIAL_CONTENT {
            return Err(Error::Uncacheable(format!("{}: partial content", self.url)));
        }

        let vary_any = self
            .headers
            .get_all(header::VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|v| v.trim() == "*");
        if vary_any {
            return Err(Error::Uncacheable(format!("{}: Vary: *", self.url)));
        }

        Ok(())
    }

    /// Serialize headers for storage as a JSON array of name/value pairs.
    ///
    /// Values are hex encoded so bytes outside UTF-8 survive the round trip.
    pub fn headers_json(&self) -> Result<String, Error> {
        let pairs: Vec<HeaderPair> = self
            .headers
            .iter()
            .map(|(name, value)| HeaderPair { name: name.as_str().to_string(), value: hex::encode(value.as_bytes()) })
            .collect();
        serde_json::to_string(&pairs).map_err(|e| Error::CorruptEntry(e.to_string()))
    }

    /// Rebuild a header map from the JSON written by [`StoredResponse::headers_json`].
    pub fn headers_from_json(json: &str) -> Result<HeaderMap, Error> {
        let pairs: Vec<HeaderPair> = serde_json::from_str(json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let mut headers = HeaderMap::with_capacity(pairs.len());
        for pair in pairs {
            let name =
                HeaderName::from_bytes(pair.name.as_bytes()).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            let bytes = hex::decode(&pair.value).map_err(|e| Error::CorruptEntry(format!("{}: {e}", pair.name)))?;
            let value = HeaderValue::from_bytes(&bytes).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            headers.append(name, value);
        }
        Ok(headers)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct HeaderPair {
    name: String,
    /// Hex of the raw value bytes.
    value: String,
}
