//! HTTP network for the offline cache controller.
//!
//! ### Origin handling
//! - Site paths resolve against the configured origin
//! - Absolute URLs must stay on that origin
//! - Fragments never reach the network or the cache
//!
//! ### Fetch semantics
//! - HTTP error statuses are returned as responses
//! - Transport failures and timeouts surface as `NETWORK_ERROR`
//! - Reload mode sends `Cache-Control: no-cache` and `Pragma: no-cache`
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod url;

use reqwest::{Client, Url, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize, resolve};

use harbor_core::{AppConfig, CacheRequest, Error, FetchMode, Network, StoredResponse};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Site origin paths resolve against.
    pub origin: Url,

    /// User agent string (default: "harbor/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    /// Network settings taken from the application configuration.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = canonicalize(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            origin,
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        })
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            origin: Url::parse("http://localhost:3000").expect("static origin parses"),
            user_agent: "harbor/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// reqwest-backed [`Network`] for a single site origin.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    fn too_large(&self, len: usize) -> Error {
        Error::FetchTooLarge(format!("{len} bytes exceeds {}", self.config.max_bytes))
    }
}

#[async_trait::async_trait]
impl Network for FetchClient {
    fn resolve(&self, path: &str) -> Result<Url, Error> {
        resolve(&self.config.origin, path).map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    async fn fetch(&self, request: &CacheRequest, mode: FetchMode) -> Result<StoredResponse, Error> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method().clone(), request.url().clone());
        if mode == FetchMode::Reload {
            builder = builder
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }
        if !request.body().is_empty() {
            builder = builder.body(request.body().clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Network(format!("timed out after {:?}: {}", self.config.timeout, request.url()))
            } else {
                Error::Network(format!("network error: {e}"))
            }
        })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(self.too_large(len as usize));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {e}")))?;

        if body.len() > self.config.max_bytes {
            return Err(self.too_large(body.len()));
        }

        tracing::debug!(
            method = %request.method(),
            url = %request.url(),
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(StoredResponse::new(final_url, status, headers, body))
    }
}
