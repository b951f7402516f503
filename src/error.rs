//! Error types for verimap

use thiserror::Error;

/// Result type alias for verimap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in verimap operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store has no node at the requested (version, path)
    #[error("Node not found: {0}")]
    NotFound(String),

    /// Malformed mutation, rejected before anything is written
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Bit index out of range: {index} (length {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// A different node was already written at this (version, path)
    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Invalid map file: {0}")]
    InvalidFile(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error means a node the commitment chain depends on is missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
