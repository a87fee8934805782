//! Cache-related MCP tools.
//!
//! Read-only views of the cache stores behind the controller. Stores are
//! only ever deleted by activation.

pub mod keys;

pub use keys::{CacheKeysParams, keys_impl};
