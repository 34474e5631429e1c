//! Error types for the spatial index.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the index, its ingestion pipeline and its query layers.
///
/// The type is `Clone` so that one failed fetch can be reported to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoscopeError {
    /// Malformed coordinates, bounds, geokeys or zoom levels.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A tile could not be fetched or decoded. The ledger entry was reset so a
    /// later query may retry.
    #[error("Failed to load tile {url}: {reason}")]
    TileLoad { url: String, reason: String },

    /// The caller stopped waiting. Work already started keeps running.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Unknown request type or malformed envelope at the worker boundary.
    #[error("Protocol error (request {request_id:?}): {message}")]
    Protocol {
        request_id: Option<String>,
        message: String,
    },

    /// The keyed-lookup service failed.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A tile body could not be decoded as a whole.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// An error relayed back from the worker, identified by its `code`.
    #[error("Worker error ({code}): {message}")]
    Worker { code: String, message: String },
}

impl GeoscopeError {
    /// Stable identifier used when the error crosses the worker boundary.
    pub fn code(&self) -> &str {
        match self {
            GeoscopeError::InvalidInput(_) => "invalid_input",
            GeoscopeError::TileLoad { .. } => "tile_load",
            GeoscopeError::Timeout(_) => "timeout",
            GeoscopeError::Protocol { .. } => "protocol",
            GeoscopeError::Backend(_) => "backend",
            GeoscopeError::Decode(_) => "decode",
            GeoscopeError::Serialization(_) => "serialization",
            GeoscopeError::Config(_) => "config",
            GeoscopeError::Worker { code, .. } => code,
        }
    }
}

impl From<serde_json::Error> for GeoscopeError {
    fn from(err: serde_json::Error) -> Self {
        GeoscopeError::Serialization(err.to_string())
    }
}

/// Result type for index operations.
pub type Result<T> = std::result::Result<T, GeoscopeError>;
