//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use harbor_core::{AppConfig, Registration};

use crate::tools::cache::{CacheKeysParams, keys_impl};
use crate::tools::site_fetch::{SiteFetchParams, fetch_impl};
use crate::tools::site_update::{SiteUpdateParams, update_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for harbor.
#[derive(Clone)]
pub struct HarborServer {
    tool_router: ToolRouter<Self>,
    registration: Arc<Registration>,
    config: Arc<AppConfig>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl HarborServer {
    /// Create a new server handler around a registration.
    pub fn new(registration: Arc<Registration>, config: Arc<AppConfig>) -> Self {
        Self { tool_router: Self::tool_router(), registration, config }
    }

    /// Fetch a site path through the offline cache controller.
    #[tool(
        description = "Fetch a path on the portfolio site through the offline cache. Serves cached pages when offline. \
                       Non-GET requests may carry a body and are never cached."
    )]
    async fn site_fetch(&self, params: Parameters<SiteFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, params.0).await
    }

    /// Install and activate a new cache version.
    #[tool(description = "Install a new cache version from the precache list and activate it, dropping older stores.")]
    async fn site_update(&self, params: Parameters<SiteUpdateParams>) -> Result<CallToolResult, McpError> {
        update_impl(&self.registration, &self.config, params.0).await
    }

    /// List cache stores and their entries.
    #[tool(description = "List cache stores and the requests stored in each.")]
    async fn cache_keys(&self, params: Parameters<CacheKeysParams>) -> Result<CallToolResult, McpError> {
        keys_impl(&self.registration, params.0).await
    }
}

impl ServerHandler for HarborServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "harbor".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
