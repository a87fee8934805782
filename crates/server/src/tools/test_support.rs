//! Shared fixtures for tool tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use harbor_core::{
    CacheRequest, Error, FetchMode, FetchStrategy, MemoryStorage, Network, PrecacheManifest, Registration,
    StoredResponse, VersionTag,
};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use rmcp::model::CallToolResult;
use serde::de::DeserializeOwned;
use url::Url;

/// Serves `page <path>` for every path on a fixed origin until switched offline.
/// Requests carrying a body get `received <body>` back.
pub(crate) struct StubNetwork {
    origin: Url,
    online: AtomicBool,
}

impl StubNetwork {
    pub(crate) fn new() -> Self {
        Self { origin: Url::parse("https://portfolio.test").unwrap(), online: AtomicBool::new(true) }
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Network for StubNetwork {
    fn resolve(&self, path: &str) -> Result<Url, Error> {
        self.origin.join(path).map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    async fn fetch(&self, request: &CacheRequest, _mode: FetchMode) -> Result<StoredResponse, Error> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network("offline".into()));
        }
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        let body = if request.body().is_empty() {
            format!("page {}", request.url().path())
        } else {
            format!("received {}", String::from_utf8_lossy(request.body()))
        };
        Ok(StoredResponse::new(request.url().clone(), StatusCode::OK, headers, body))
    }
}

pub(crate) fn manifest() -> PrecacheManifest {
    PrecacheManifest::new(["/", "/resume"])
}

/// A registration with `portfolio-v1` installed and active.
pub(crate) async fn registered() -> (Arc<Registration>, Arc<StubNetwork>) {
    let network = Arc::new(StubNetwork::new());
    let registration = Arc::new(Registration::new(Arc::new(MemoryStorage::new()), network.clone()));
    let controller =
        registration.controller(VersionTag::new("portfolio-v1").unwrap(), manifest(), FetchStrategy::CacheFirst);
    registration.register(controller).await.unwrap();
    (registration, network)
}

/// Decode the JSON text content of a tool result.
pub(crate) fn output_of<T: DeserializeOwned>(result: &CallToolResult) -> T {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
