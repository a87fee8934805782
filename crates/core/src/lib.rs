//! Core types and shared functionality for harbor.
//!
//! This crate provides:
//! - The offline cache controller and its registration host
//! - Cache storage with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod message;
pub mod network;

pub use cache::{CacheDb, CacheStorage, MemoryStorage};
pub use config::AppConfig;
pub use controller::{
    FetchStrategy, Intercepted, OfflineController, Phase, PrecacheManifest, Registration, ResponseSource, VersionTag,
};
pub use error::Error;
pub use message::{CacheRequest, FetchMode, StoredResponse};
pub use network::Network;
