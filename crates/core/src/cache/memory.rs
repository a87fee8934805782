//! In-memory implementation of [`CacheStorage`].
//!
//! Stores and entries are kept in insertion order behind a tokio `RwLock`.
//! Nothing survives the process.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::CacheStorage;
use crate::Error;
use crate::message::{CacheRequest, StoredResponse};

#[derive(Debug, Default)]
struct Store {
    name: String,
    entries: Vec<(CacheRequest, StoredResponse)>,
}

impl Store {
    fn find(&self, request: &CacheRequest) -> Option<&StoredResponse> {
        self.entries.iter().find(|(key, _)| key == request).map(|(_, response)| response)
    }

    /// Replace an existing entry by moving it to the end.
    fn insert(&mut self, request: CacheRequest, response: StoredResponse) {
        self.entries.retain(|(key, _)| *key != request);
        self.entries.push((request, response));
    }
}

/// Process-local cache storage. Clones share the same stores.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    stores: Arc<RwLock<Vec<Store>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn create_store<'a>(stores: &'a mut Vec<Store>, name: &str) -> &'a mut Store {
    match stores.iter().position(|s| s.name == name) {
        Some(idx) => &mut stores[idx],
        None => {
            stores.push(Store { name: name.to_string(), entries: Vec::new() });
            let last = stores.len() - 1;
            &mut stores[last]
        }
    }
}

#[async_trait::async_trait]
impl CacheStorage for MemoryStorage {
    async fn has(&self, name: &str) -> Result<bool, Error> {
        Ok(self.stores.read().await.iter().any(|s| s.name == name))
    }

    async fn names(&self) -> Result<Vec<String>, Error> {
        Ok(self.stores.read().await.iter().map(|s| s.name.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut stores = self.stores.write().await;
        let before = stores.len();
        stores.retain(|s| s.name != name);
        Ok(stores.len() != before)
    }

    async fn match_request(&self, request: &CacheRequest) -> Result<Option<StoredResponse>, Error> {
        let stores = self.stores.read().await;
        Ok(stores.iter().find_map(|s| s.find(request)).cloned())
    }

    async fn put(&self, name: &str, request: &CacheRequest, response: &StoredResponse) -> Result<bool, Error> {
        response.ensure_storable()?;
        let mut stores = self.stores.write().await;
        match stores.iter_mut().find(|s| s.name == name) {
            Some(store) => {
                store.insert(request.clone(), response.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn put_all(&self, name: &str, entries: Vec<(CacheRequest, StoredResponse)>) -> Result<(), Error> {
        for (_, response) in &entries {
            response.ensure_storable()?;
        }
        let mut stores = self.stores.write().await;
        let store = create_store(&mut stores, name);
        for (request, response) in entries {
            store.insert(request, response);
        }
        Ok(())
    }

    async fn keys(&self, name: &str) -> Result<Vec<CacheRequest>, Error> {
        let stores = self.stores.read().await;
        Ok(stores
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.entries.iter().map(|(key, _)| key.clone()).collect())
            .unwrap_or_default())
    }
}
