//! site_fetch tool implementation.
//!
//! Routes a request for a site path through the active controller, the way
//! a controlled page would.

use harbor_core::{CacheRequest, Network, Registration, ResponseSource};
use http::Method;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::json_result;

/// Input parameters for site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchParams {
    /// Site path (e.g. "/resume") or a URL on the configured origin.
    pub path: String,

    /// HTTP method (default: GET). Only GET responses are cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request body, sent only with non-GET methods. Never cached.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for site_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SiteFetchOutput {
    /// Final response URL.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header.
    pub content_type: Option<String>,
    /// Response headers as name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Response body, decoded as UTF-8 with replacement.
    pub body: String,
    /// Where the response came from: cache, network, or fallback.
    pub source: ResponseSource,
    /// Version of the controller that handled the request, if any.
    pub version: Option<String>,
}

/// Implementation of the site_fetch tool.
pub async fn fetch_impl(registration: &Registration, params: SiteFetchParams) -> Result<CallToolResult, McpError> {
    if params.path.trim().is_empty() {
        return Err(ToolError::InvalidInput("path cannot be empty".into()).into());
    }

    let method = Method::from_bytes(params.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ToolError::InvalidInput(format!("invalid method: {}", params.method)))?;
    let url = registration.network().resolve(&params.path)?;

    let mut request = CacheRequest::new(method, url);
    if let Some(body) = params.body {
        if request.is_retrieval() {
            return Err(ToolError::InvalidInput("body is only sent with non-GET methods".into()).into());
        }
        request = request.with_body(body);
    }

    let intercepted = registration.handle(request).await?;
    let response = intercepted.response;

    let output = SiteFetchOutput {
        url: response.url.to_string(),
        status: response.status.as_u16(),
        content_type: response.content_type().map(str::to_string),
        headers: response
            .headers
            .iter()
            .map(|(name, value)| (name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect(),
        body: String::from_utf8_lossy(&response.body).into_owned(),
        source: intercepted.source,
        version: registration.active_version().await.map(|v| v.to_string()),
    };

    json_result(&output)
}
