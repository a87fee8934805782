//! Host side of the controller lifecycle.
//!
//! A [`Registration`] keeps at most one active controller, runs install and
//! activate when a new version is registered, and routes requests to the
//! active controller. A failed install leaves the previous controller
//! serving.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::{FetchStrategy, Intercepted, OfflineController, PrecacheManifest, ResponseSource, VersionTag};
use crate::Error;
use crate::cache::CacheStorage;
use crate::message::{CacheRequest, FetchMode};
use crate::network::Network;

pub struct Registration {
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    active: RwLock<Option<Arc<OfflineController>>>,
    updating: Mutex<()>,
}

impl Registration {
    pub fn new(storage: Arc<dyn CacheStorage>, network: Arc<dyn Network>) -> Self {
        Self { storage, network, active: RwLock::new(None), updating: Mutex::new(()) }
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    /// Build a controller sharing this registration's storage and network.
    pub fn controller(
        &self, version: VersionTag, manifest: PrecacheManifest, strategy: FetchStrategy,
    ) -> OfflineController {
        OfflineController::new(version, manifest, Arc::clone(&self.storage), Arc::clone(&self.network))
            .with_strategy(strategy)
    }

    pub async fn active(&self) -> Option<Arc<OfflineController>> {
        self.active.read().await.clone()
    }

    pub async fn active_version(&self) -> Option<VersionTag> {
        self.active.read().await.as_ref().map(|c| c.version().clone())
    }

    /// Install and activate a controller, making it the active one.
    ///
    /// Registering the already active version is a no-op. If a store for
    /// the version already exists it was installed by an earlier run and
    /// install is skipped. Background writes of the outgoing controller are
    /// drained before activation deletes its store. Returns the names of
    /// stores deleted during activation.
    ///
    /// # Errors
    ///
    /// Install and activation errors are returned unchanged; the previously
    /// active controller, if any, stays active.
    pub async fn register(&self, controller: OfflineController) -> Result<Vec<String>, Error> {
        let _updating = self.updating.lock().await;

        if self.active_version().await.as_ref() == Some(controller.version()) {
            tracing::debug!(version = %controller.version(), "version already active");
            return Ok(Vec::new());
        }

        if self.storage.has(controller.version().as_str()).await? {
            controller.resume().await?;
        } else {
            controller.on_install().await?;
        }

        // Pending writes of the outgoing version must land before its store is deleted.
        if let Some(previous) = self.active().await {
            previous.settle().await;
        }
        let deleted = controller.on_activate().await?;

        let previous = self.active.write().await.replace(Arc::new(controller));
        if let Some(previous) = previous {
            previous.settle().await;
            tracing::info!(previous = %previous.version(), "replaced active controller");
        }

        Ok(deleted)
    }

    /// Route a request through the active controller.
    ///
    /// Without an active controller the request goes straight to the
    /// network and nothing is cached.
    pub async fn handle(&self, request: CacheRequest) -> Result<Intercepted, Error> {
        match self.active().await {
            Some(controller) => controller.on_intercept(request).await,
            None => {
                tracing::debug!(url = %request.url(), "no active controller");
                let response = self.network.fetch(&request, FetchMode::Default).await?;
                Ok(Intercepted { response, source: ResponseSource::Network })
            }
        }
    }

    /// Wait for the active controller's background cache writes.
    pub async fn settle(&self) {
        if let Some(controller) = self.active().await {
            controller.settle().await;
        }
    }
}
