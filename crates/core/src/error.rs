//! Unified error types for harbor.
//!
//! Display strings carry a stable `CODE: message` prefix so callers on the
//! MCP side can match on them.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the harbor controller and its surfaces.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty path).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL or path that cannot be resolved against the origin.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The network could not produce a response (offline, refused, timed out).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Response body exceeded the configured limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// A precache fetch failed; the version being installed never activates.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// A lifecycle method was called from the wrong phase.
    #[error("INVALID_PHASE: {0}")]
    InvalidPhase(String),

    /// The response cannot be written to a cache store.
    #[error("UNCACHEABLE: {0}")]
    Uncacheable(String),

    /// No cache entry or store for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Stored response data could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::InvalidUrl(msg) => (-32003, msg.clone()),
            Error::Network(msg) => (-32008, msg.clone()),
            Error::FetchTooLarge(msg) => (-32007, msg.clone()),
            Error::InstallFailed(msg) => (-32020, msg.clone()),
            Error::InvalidPhase(msg) => (-32021, msg.clone()),
            Error::Uncacheable(msg) => (-32022, msg.clone()),
            Error::CacheMiss(msg) => (-32001, msg.clone()),
            Error::CorruptEntry(msg) => (-32002, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
