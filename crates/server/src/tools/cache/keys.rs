//! cache_keys tool implementation.
//!
//! Lists cache stores and the requests stored in each.

use harbor_core::{CacheStorage, Error, Registration};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Only list this store. Lists every store when omitted.
    #[serde(default)]
    pub store: Option<String>,
}

/// One cache store and its entries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StoreListing {
    pub name: String,
    /// Whether this store belongs to the active version.
    pub active: bool,
    /// Stored requests as "METHOD url", oldest first.
    pub entries: Vec<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub stores: Vec<StoreListing>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(registration: &Registration, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let storage = registration.storage();
    let active = registration.active_version().await;

    let names = match params.store {
        Some(name) => {
            if !storage.has(&name).await? {
                return Err(Error::CacheMiss(format!("no store named {name}")).into());
            }
            vec![name]
        }
        None => storage.names().await?,
    };

    let mut stores = Vec::with_capacity(names.len());
    for name in names {
        let entries = storage
            .keys(&name)
            .await?
            .iter()
            .map(|key| format!("{} {}", key.method(), key.url()))
            .collect();
        let active = active.as_ref().is_some_and(|v| v.as_str() == name);
        stores.push(StoreListing { name, active, entries });
    }

    json_result(&CacheKeysOutput { stores })
}
