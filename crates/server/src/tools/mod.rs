//! MCP tool implementations.
//!
//! This module contains all tools exposed by the harbor server.

pub mod cache;
pub mod site_fetch;
pub mod site_update;

#[cfg(test)]
pub(crate) mod test_support;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::error::ToolError;

pub use site_fetch::{SiteFetchOutput, SiteFetchParams};
pub use site_update::{SiteUpdateOutput, SiteUpdateParams};

/// Wrap a tool output as pretty-printed JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::Output(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
