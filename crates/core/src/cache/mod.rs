//! Named, versioned cache stores.
//!
//! A storage handle holds any number of stores. Each store maps a request
//! identity (method + URL) to a stored response. Two backends implement
//! [`CacheStorage`]:
//!
//! - [`CacheDb`]: SQLite with async access via tokio-rusqlite
//! - [`MemoryStorage`]: process-local maps for tests and ephemeral runs

pub mod connection;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use memory::MemoryStorage;

use crate::message::{CacheRequest, StoredResponse};

/// Storage handle shared by the controller and its background writes.
///
/// Concurrent reads are safe. Concurrent writes to the same entry are
/// last-writer-wins.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    async fn has(&self, name: &str) -> Result<bool, Error>;

    /// Store names in creation order.
    async fn names(&self) -> Result<Vec<String>, Error>;

    /// Delete a store and all of its entries. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Look a request up across every store, oldest store first.
    async fn match_request(&self, request: &CacheRequest) -> Result<Option<StoredResponse>, Error>;

    /// Insert or replace one entry in an existing store.
    ///
    /// Returns false and writes nothing if the store does not exist.
    async fn put(&self, name: &str, request: &CacheRequest, response: &StoredResponse) -> Result<bool, Error>;

    /// Create the store if needed and write every entry, or write nothing.
    async fn put_all(&self, name: &str, entries: Vec<(CacheRequest, StoredResponse)>) -> Result<(), Error>;

    /// Entry keys of a store in insertion order. Empty if the store does not exist.
    async fn keys(&self, name: &str) -> Result<Vec<CacheRequest>, Error>;
}
