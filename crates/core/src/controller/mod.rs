//! Offline cache controller.
//!
//! A controller owns one cache generation, named by its [`VersionTag`], and
//! moves through three lifecycle phases:
//!
//! - **install**: fetch every manifest path bypassing HTTP caches and write
//!   them all into the version's store, or nothing at all
//! - **activate**: delete every store that is not the version's store
//! - **intercept**: answer requests from the cache or the network, keeping
//!   GET responses as an offline fallback
//!
//! The storage handle and the network are injected so the phases run
//! without a hosting environment.

pub mod manifest;
pub mod registration;

#[cfg(test)]
pub(crate) mod testing;

use std::fmt;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;

use crate::Error;
use crate::cache::CacheStorage;
use crate::message::{CacheRequest, FetchMode, StoredResponse};
use crate::network::Network;

pub use manifest::{PrecacheManifest, VersionTag};
pub use registration::Registration;

/// Lifecycle phase of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this controller will never serve.
    Redundant,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Parsed => "parsed",
            Phase::Installing => "installing",
            Phase::Installed => "installed",
            Phase::Activating => "activating",
            Phase::Activated => "activated",
            Phase::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Order in which the cache and the network are consulted for GET requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum FetchStrategy {
    /// Any cached entry short-circuits the network, even when it is stale.
    #[default]
    CacheFirst,
    /// Always try the network; the cache is only a fallback.
    NetworkFirst,
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
    /// The network failed and a cached copy was served instead.
    Fallback,
}

/// Result of intercepting a request.
#[derive(Debug, Clone)]
pub struct Intercepted {
    pub response: StoredResponse,
    pub source: ResponseSource,
}

/// Controller for a single cache generation.
pub struct OfflineController {
    version: VersionTag,
    manifest: PrecacheManifest,
    strategy: FetchStrategy,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    phase: RwLock<Phase>,
    pending: Mutex<JoinSet<()>>,
}

impl OfflineController {
    pub fn new(
        version: VersionTag, manifest: PrecacheManifest, storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>,
    ) -> Self {
        Self {
            version,
            manifest,
            strategy: FetchStrategy::default(),
            storage,
            network,
            phase: RwLock::new(Phase::Parsed),
            pending: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn version(&self) -> &VersionTag {
        &self.version
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.read().await
    }

    async fn transition(&self, from: Phase, to: Phase) -> Result<(), Error> {
        let mut phase = self.phase.write().await;
        if *phase != from {
            return Err(Error::InvalidPhase(format!(
                "{}: cannot move to {to} from {}, expected {from}",
                self.version, *phase
            )));
        }
        *phase = to;
        Ok(())
    }

    async fn set_phase(&self, to: Phase) {
        *self.phase.write().await = to;
    }

    /// Install phase: precache every manifest path into the version's store.
    ///
    /// Every path is fetched with [`FetchMode::Reload`]. Any failed fetch,
    /// non-2xx status or uncacheable response fails the install as a whole
    /// and leaves the store untouched; the controller becomes
    /// [`Phase::Redundant`].
    pub async fn on_install(&self) -> Result<(), Error> {
        self.transition(Phase::Parsed, Phase::Installing).await?;
        tracing::info!(version = %self.version, paths = self.manifest.len(), "installing");

        match self.precache().await {
            Ok(()) => {
                self.set_phase(Phase::Installed).await;
                tracing::info!(version = %self.version, "installed");
                Ok(())
            }
            Err(e) => {
                self.set_phase(Phase::Redundant).await;
                tracing::warn!(version = %self.version, error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<(), Error> {
        let requests = self
            .manifest
            .paths()
            .iter()
            .map(|path| {
                self.network
                    .resolve(path)
                    .map(CacheRequest::get)
                    .map_err(|e| Error::InstallFailed(format!("{path}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let fetches = requests.into_iter().map(|request| async move {
            let response = self
                .network
                .fetch(&request, FetchMode::Reload)
                .await
                .map_err(|e| Error::InstallFailed(format!("{}: {e}", request.url())))?;
            if !response.ok() {
                return Err(Error::InstallFailed(format!("{}: status {}", request.url(), response.status.as_u16())));
            }
            response
                .ensure_storable()
                .map_err(|e| Error::InstallFailed(e.to_string()))?;
            Ok((request, response))
        });

        let entries = futures::future::try_join_all(fetches).await?;

        self.storage
            .put_all(self.version.as_str(), entries)
            .await
            .map_err(|e| Error::InstallFailed(format!("writing {}: {e}", self.version)))
    }

    /// Treat the version's existing store as the result of an earlier install.
    pub(crate) async fn resume(&self) -> Result<(), Error> {
        self.transition(Phase::Parsed, Phase::Installed).await?;
        tracing::info!(version = %self.version, "resuming previously installed version");
        Ok(())
    }

    /// Activate phase: delete every store not named by this version.
    ///
    /// Returns the names of the deleted stores. On a storage error the
    /// controller stays [`Phase::Installed`] so activation can be retried.
    pub async fn on_activate(&self) -> Result<Vec<String>, Error> {
        self.transition(Phase::Installed, Phase::Activating).await?;

        match self.delete_stale_stores().await {
            Ok(deleted) => {
                self.set_phase(Phase::Activated).await;
                tracing::info!(version = %self.version, deleted = ?deleted, "activated");
                Ok(deleted)
            }
            Err(e) => {
                self.set_phase(Phase::Installed).await;
                Err(e)
            }
        }
    }

    async fn delete_stale_stores(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.storage.names().await? {
            if name != self.version.as_str() && self.storage.delete(&name).await? {
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Intercept a request once activated.
    ///
    /// 1. Cache-first: a cached entry is returned without touching the network.
    /// 2. Non-GET requests go to the network and are never stored.
    /// 3. A GET miss is fetched; a copy of the response is written to the
    ///    version's store in the background and the original is returned.
    ///    The write is skipped if the store has been deleted by then.
    /// 4. If the network fails, a cached entry is served if one exists;
    ///    otherwise the network error is returned.
    pub async fn on_intercept(&self, request: CacheRequest) -> Result<Intercepted, Error> {
        let phase = self.phase().await;
        if phase != Phase::Activated {
            return Err(Error::InvalidPhase(format!("{}: cannot intercept while {phase}", self.version)));
        }

        if self.strategy == FetchStrategy::CacheFirst
            && let Some(response) = self.lookup(&request).await
        {
            tracing::debug!(url = %request.url(), "cache hit");
            return Ok(Intercepted { response, source: ResponseSource::Cache });
        }

        if !request.is_retrieval() {
            tracing::debug!(method = %request.method(), url = %request.url(), "passing through");
            let response = self.network.fetch(&request, FetchMode::Default).await?;
            return Ok(Intercepted { response, source: ResponseSource::Network });
        }

        match self.network.fetch(&request, FetchMode::Default).await {
            Ok(response) => {
                self.store_in_background(request, response.clone()).await;
                Ok(Intercepted { response, source: ResponseSource::Network })
            }
            Err(e) => match self.lookup(&request).await {
                Some(response) => {
                    tracing::debug!(url = %request.url(), error = %e, "network failed, serving cached copy");
                    Ok(Intercepted { response, source: ResponseSource::Fallback })
                }
                None => {
                    tracing::debug!(url = %request.url(), error = %e, "network failed, nothing cached");
                    Err(e)
                }
            },
        }
    }

    /// Cache lookup across every store. Storage errors count as a miss.
    async fn lookup(&self, request: &CacheRequest) -> Option<StoredResponse> {
        match self.storage.match_request(request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url(), error = %e, "cache lookup failed");
                None
            }
        }
    }

    async fn store_in_background(&self, request: CacheRequest, response: StoredResponse) {
        let storage = Arc::clone(&self.storage);
        let store = self.version.as_str().to_string();

        let mut pending = self.pending.lock().await;
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            match storage.put(&store, &request, &response).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!(url = %request.url(), store = %store, "store gone, dropping cache write"),
                Err(e) => tracing::warn!(url = %request.url(), store = %store, error = %e, "dropping cache write"),
            }
        });
    }

    /// Wait until every background cache write has finished.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(&mut *self.pending.lock().await);
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                tracing::warn!(version = %self.version, error = %e, "cache write task failed");
            }
        }
    }
}

impl fmt::Debug for OfflineController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineController")
            .field("version", &self.version)
            .field("manifest", &self.manifest)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeNetwork, controller, request};
    use super::*;
    use crate::cache::{CacheDb, MemoryStorage};
    use http::{Method, StatusCode};

    #[tokio::test]
    async fn test_precached_paths_served_offline() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        let ctrl = controller("portfolio-v1", storage.clone(), network.clone());

        ctrl.on_install().await.unwrap();
        ctrl.on_activate().await.unwrap();

        network.set_online(false);
        let before = network.calls();
        for path in PrecacheManifest::default().paths() {
            let hit = ctrl.on_intercept(request(path)).await.unwrap();
            assert_eq!(hit.source, ResponseSource::Cache, "{path}");
            assert_eq!(hit.response.body, network.body_for(path));
        }
        assert_eq!(network.calls(), before);
    }

    #[tokio::test]
    async fn test_install_bypasses_http_cache() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        let ctrl = controller("portfolio-v1", storage, network.clone());

        ctrl.on_install().await.unwrap();
        assert!(network.modes().iter().all(|m| *m == FetchMode::Reload));
        assert_eq!(network.modes().len(), 7);
    }

    #[tokio::test]
    async fn test_install_failure_is_atomic() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        network.fail_path("/resume");
        let ctrl = controller("portfolio-v1", storage.clone(), network);

        let result = ctrl.on_install().await;
        assert!(matches!(result, Err(Error::InstallFailed(_))));
        assert_eq!(ctrl.phase().await, Phase::Redundant);
        assert!(!storage.has("portfolio-v1").await.unwrap());
        assert!(matches!(ctrl.on_activate().await, Err(Error::InvalidPhase(_))));
    }

    #[tokio::test]
    async fn test_install_rejects_error_status() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        network.set_status("/agents", StatusCode::NOT_FOUND);
        let ctrl = controller("portfolio-v1", storage.clone(), network);

        let err = ctrl.on_install().await.unwrap_err();
        assert!(err.to_string().contains("status 404"));
        assert!(storage.names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_only_once() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        let ctrl = controller("portfolio-v1", storage, network);

        ctrl.on_install().await.unwrap();
        assert!(matches!(ctrl.on_install().await, Err(Error::InvalidPhase(_))));
    }

    #[tokio::test]
    async fn test_intercept_requires_activation() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        let ctrl = controller("portfolio-v1", storage, network);

        ctrl.on_install().await.unwrap();
        let result = ctrl.on_intercept(request("/")).await;
        assert!(matches!(result, Err(Error::InvalidPhase(_))));
    }

    #[tokio::test]
    async fn test_non_retrieval_never_stored() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        let ctrl = controller("portfolio-v1", storage.clone(), network.clone());
        ctrl.on_install().await.unwrap();
        ctrl.on_activate().await.unwrap();

        let keys_before = storage.keys("portfolio-v1").await.unwrap();
        let post = CacheRequest::new(Method::POST, network.resolve("/contact").unwrap());
        let result = ctrl.on_intercept(post).await.unwrap();
        ctrl.settle().await;

        assert_eq!(result.source, ResponseSource::Network);
        assert_eq!(storage.keys("portfolio-v1").await.unwrap(), keys_before);
    }

    #[tokio::test]
    async fn test_non_retrieval_failure_propagates() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        let ctrl = controller("portfolio-v1", storage, network.clone());
        ctrl.on_install().await.unwrap();
        ctrl.on_activate().await.unwrap();

        network.set_online(false);
        let post = CacheRequest::new(Method::POST, network.resolve("/contact").unwrap());
        assert!(matches!(ctrl.on_intercept(post).await, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_cache_hit_shadows_network() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        let ctrl = controller("portfolio-v1", storage.clone(), network.clone());
        ctrl.on_install().await.unwrap();
        ctrl.on_activate().await.unwrap();

        let seeded = network.response_for("/resume", "cached resume");
        assert!(storage.put("portfolio-v1", &request("/resume"), &seeded).await.unwrap());
        network.set_body("/resume", "fresh resume");

        let before = network.calls();
        let hit = ctrl.on_intercept(request("/resume")).await.unwrap();
        assert_eq!(hit.source, ResponseSource::Cache);
        assert_eq!(&hit.response.body[..], b"cached resume");
        assert_eq!(network.calls(), before);
    }

    #[tokio::test]
    async fn test_miss_fetches_and_stores_copy() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        network.set_body("/projects/harbor", "harbor project");
        let ctrl = controller("portfolio-v1", storage.clone(), network.clone());
        ctrl.on_install().await.unwrap();
        ctrl.on_activate().await.unwrap();

        let result = ctrl.on_intercept(request("/projects/harbor")).await.unwrap();
        assert_eq!(result.source, ResponseSource::Network);
        assert_eq!(&result.response.body[..], b"harbor project");

        ctrl.settle().await;
        let stored = storage.match_request(&request("/projects/harbor")).await.unwrap().unwrap();
        assert_eq!(stored.body, result.response.body);
        assert!(storage.keys("portfolio-v1").await.unwrap().contains(&request("/projects/harbor")));
    }

    #[tokio::test]
    async fn test_write_after_store_deleted_is_dropped() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        network.set_body("/blog", "blog");
        let ctrl = controller("portfolio-v1", storage.clone(), network);
        ctrl.on_install().await.unwrap();
        ctrl.on_activate().await.unwrap();

        storage.delete("portfolio-v1").await.unwrap();
        let result = ctrl.on_intercept(request("/blog")).await.unwrap();
        ctrl.settle().await;

        assert_eq!(result.source, ResponseSource::Network);
        assert!(storage.names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_on_sqlite() {
        let storage = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let network = Arc::new(FakeNetwork::portfolio());
        network.set_body("/blog", "blog");

        let v1 = OfflineController::new(
            VersionTag::new("portfolio-v1").unwrap(),
            PrecacheManifest::default(),
            storage.clone(),
            network.clone(),
        );
        v1.on_install().await.unwrap();
        v1.on_activate().await.unwrap();
        assert_eq!(storage.keys("portfolio-v1").await.unwrap().len(), 7);

        let live = v1.on_intercept(request("/blog")).await.unwrap();
        assert_eq!(live.source, ResponseSource::Network);
        v1.settle().await;

        let v2 = OfflineController::new(
            VersionTag::new("portfolio-v2").unwrap(),
            PrecacheManifest::default(),
            storage.clone(),
            network.clone(),
        );
        v2.on_install().await.unwrap();
        assert_eq!(v2.on_activate().await.unwrap(), vec!["portfolio-v1".to_string()]);
        assert_eq!(storage.names().await.unwrap(), vec!["portfolio-v2".to_string()]);

        network.set_online(false);
        let hit = v2.on_intercept(request("/resume")).await.unwrap();
        assert_eq!(hit.source, ResponseSource::Cache);
        assert_eq!(hit.response.body, network.body_for("/resume"));
        assert_eq!(hit.response.content_type(), Some("text/html"));
        assert!(matches!(v2.on_intercept(request("/blog")).await, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_miss_offline_propagates_failure() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        let ctrl = controller("portfolio-v1", storage.clone(), network.clone());
        ctrl.on_install().await.unwrap();
        ctrl.on_activate().await.unwrap();

        network.set_online(false);
        let result = ctrl.on_intercept(request("/projects/unknown")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_uncacheable_write_is_dropped() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        network.set_status("/video", StatusCode::PARTIAL_CONTENT);
        let ctrl = controller("portfolio-v1", storage.clone(), network.clone());
        ctrl.on_install().await.unwrap();
        ctrl.on_activate().await.unwrap();

        let result = ctrl.on_intercept(request("/video")).await.unwrap();
        ctrl.settle().await;

        assert_eq!(result.response.status, StatusCode::PARTIAL_CONTENT);
        assert!(storage.match_request(&request("/video")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_network_first_prefers_network_and_falls_back() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());
        let ctrl =
            controller("portfolio-v1", storage.clone(), network.clone()).with_strategy(FetchStrategy::NetworkFirst);
        ctrl.on_install().await.unwrap();
        ctrl.on_activate().await.unwrap();

        network.set_body("/resume", "fresh resume");
        let live = ctrl.on_intercept(request("/resume")).await.unwrap();
        assert_eq!(live.source, ResponseSource::Network);
        assert_eq!(&live.response.body[..], b"fresh resume");
        ctrl.settle().await;

        network.set_online(false);
        let offline = ctrl.on_intercept(request("/resume")).await.unwrap();
        assert_eq!(offline.source, ResponseSource::Fallback);
        assert_eq!(&offline.response.body[..], b"fresh resume");
    }

    #[tokio::test]
    async fn test_activate_deletes_other_versions() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(FakeNetwork::portfolio());

        let v1 = controller("portfolio-v1", storage.clone(), network.clone());
        v1.on_install().await.unwrap();
        v1.on_activate().await.unwrap();

        let v2 = controller("portfolio-v2", storage.clone(), network);
        v2.on_install().await.unwrap();
        let deleted = v2.on_activate().await.unwrap();

        assert_eq!(deleted, vec!["portfolio-v1".to_string()]);
        assert!(!storage.has("portfolio-v1").await.unwrap());
        assert!(storage.has("portfolio-v2").await.unwrap());
        assert_eq!(v2.phase().await, Phase::Activated);
    }
}
