//! The network seam the controller fetches through.

use url::Url;

use crate::Error;
use crate::message::{CacheRequest, FetchMode, StoredResponse};

/// Network access for the controller.
///
/// Implementations return HTTP error statuses as responses; only a missing
/// response (offline, refused, timed out, too large) is an `Err`.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Resolve a site path (e.g. `/resume`) to an absolute URL.
    fn resolve(&self, path: &str) -> Result<Url, Error>;

    async fn fetch(&self, request: &CacheRequest, mode: FetchMode) -> Result<StoredResponse, Error>;
}
