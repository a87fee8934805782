//! Application configuration with layered loading.
//!
//! Configuration is merged with figment from:
//!
//! 1. Environment variables (HARBOR_*)
//! 2. TOML config file (if HARBOR_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::controller::{FetchStrategy, PrecacheManifest, VersionTag};

mod validation;

pub use validation::ConfigError;

/// Database path that selects the in-memory storage backend.
pub const IN_MEMORY_DB: &str = ":memory:";

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (HARBOR_*)
/// 2. TOML config file (if HARBOR_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database, or `:memory:`.
    ///
    /// Set via HARBOR_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Site origin that manifest paths and fetched paths resolve against.
    ///
    /// Set via HARBOR_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Version tag naming the current cache store.
    ///
    /// Bump it whenever the precache list or the strategy changes.
    /// Set via HARBOR_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Routes fetched and stored at install time.
    ///
    /// Set via HARBOR_PRECACHE environment variable (`["/", "/resume"]`).
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Interception strategy: `cache-first` or `network-first`.
    ///
    /// Set via HARBOR_STRATEGY environment variable.
    #[serde(default)]
    pub strategy: FetchStrategy,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via HARBOR_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via HARBOR_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body size in bytes.
    ///
    /// Set via HARBOR_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./harbor-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_version() -> String {
    "portfolio-v1".into()
}

fn default_precache() -> Vec<String> {
    PrecacheManifest::default().paths().to_vec()
}

fn default_user_agent() -> String {
    "harbor/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            version: default_version(),
            precache: default_precache(),
            strategy: FetchStrategy::default(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether the in-memory storage backend is selected.
    pub fn in_memory(&self) -> bool {
        self.db_path == Path::new(IN_MEMORY_DB)
    }

    pub fn version_tag(&self) -> Result<VersionTag, ConfigError> {
        VersionTag::new(&self.version)
            .map_err(|e| ConfigError::Invalid { field: "version".into(), reason: e.to_string() })
    }

    pub fn manifest(&self) -> PrecacheManifest {
        PrecacheManifest::new(self.precache.iter().cloned())
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("HARBOR_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("HARBOR_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
