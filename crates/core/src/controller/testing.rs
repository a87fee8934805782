//! In-process network fake for controller tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use url::Url;

use super::{OfflineController, PrecacheManifest, VersionTag};
use crate::Error;
use crate::cache::MemoryStorage;
use crate::message::{CacheRequest, FetchMode, StoredResponse};
use crate::network::Network;

pub(crate) const ORIGIN: &str = "https://portfolio.test";

pub(crate) fn request(path: &str) -> CacheRequest {
    CacheRequest::get(Url::parse(ORIGIN).unwrap().join(path).unwrap())
}

pub(crate) fn controller(
    version: &str, storage: Arc<MemoryStorage>, network: Arc<FakeNetwork>,
) -> OfflineController {
    OfflineController::new(VersionTag::new(version).unwrap(), PrecacheManifest::default(), storage, network)
}

/// Serves canned pages for an origin and can be switched offline.
pub(crate) struct FakeNetwork {
    origin: Url,
    online: AtomicBool,
    calls: AtomicUsize,
    routes: Mutex<HashMap<String, (StatusCode, String)>>,
    failing: Mutex<HashSet<String>>,
    modes: Mutex<Vec<FetchMode>>,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self {
            origin: Url::parse(ORIGIN).unwrap(),
            online: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            routes: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            modes: Mutex::new(Vec::new()),
        }
    }

    /// A network serving every default manifest route.
    pub(crate) fn portfolio() -> Self {
        let network = Self::new();
        for path in PrecacheManifest::default().paths() {
            network.set_body(path, &format!("page {path}"));
        }
        network
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub(crate) fn set_body(&self, path: &str, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(path.to_string(), (StatusCode::OK, body.to_string()));
    }

    pub(crate) fn set_status(&self, path: &str, status: StatusCode) {
        let mut routes = self.routes.lock().unwrap();
        let route = routes.entry(path.to_string()).or_insert((status, String::new()));
        route.0 = status;
    }

    pub(crate) fn fail_path(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn modes(&self) -> Vec<FetchMode> {
        self.modes.lock().unwrap().clone()
    }

    pub(crate) fn body_for(&self, path: &str) -> Bytes {
        let routes = self.routes.lock().unwrap();
        Bytes::from(routes.get(path).map(|(_, body)| body.clone()).unwrap_or_default())
    }

    pub(crate) fn response_for(&self, path: &str, body: &str) -> StoredResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        StoredResponse::new(self.origin.join(path).unwrap(), StatusCode::OK, headers, body.to_string())
    }
}

#[async_trait::async_trait]
impl Network for FakeNetwork {
    fn resolve(&self, path: &str) -> Result<Url, Error> {
        self.origin.join(path).map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    async fn fetch(&self, request: &CacheRequest, mode: FetchMode) -> Result<StoredResponse, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.modes.lock().unwrap().push(mode);

        let path = request.url().path().to_string();
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{path}: offline")));
        }
        if self.failing.lock().unwrap().contains(&path) {
            return Err(Error::Network(format!("{path}: connection reset")));
        }

        let (status, body) = self
            .routes
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .unwrap_or((StatusCode::NOT_FOUND, "not found".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        Ok(StoredResponse::new(request.url().clone(), status, headers, body))
    }
}
