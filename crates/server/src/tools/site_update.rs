//! site_update tool implementation.
//!
//! Registers a new cache generation: install under the new version tag,
//! then activate it, which drops every older store.

use harbor_core::{AppConfig, Registration, VersionTag};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Input parameters for site_update tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteUpdateParams {
    /// New version tag, e.g. "portfolio-v2".
    pub version: String,
}

/// Output structure for site_update tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteUpdateOutput {
    /// Version now active.
    pub version: String,
    /// Number of paths in the precache manifest.
    pub precached: usize,
    /// Stores deleted during activation.
    pub deleted_stores: Vec<String>,
}

/// Implementation of the site_update tool.
///
/// On install failure the previously active version keeps serving and the
/// error is returned.
pub async fn update_impl(
    registration: &Registration, config: &AppConfig, params: SiteUpdateParams,
) -> Result<CallToolResult, McpError> {
    let version = VersionTag::new(params.version.trim())?;
    let manifest = config.manifest();
    let precached = manifest.len();

    let controller = registration.controller(version.clone(), manifest, config.strategy);
    let deleted_stores = registration.register(controller).await?;

    json_result(&SiteUpdateOutput { version: version.to_string(), precached, deleted_stores })
}
