//! Error types for tag editing, conversion and lookups

use std::path::PathBuf;

use thiserror::Error;

/// Result type used across the library modules
pub type Result<T> = std::result::Result<T, TagfixError>;

/// Failure taxonomy shared by every operation
#[derive(Error, Debug)]
pub enum TagfixError {
    /// Path does not exist
    #[error("Path '{}' does not exist", .0.display())]
    NotFound(PathBuf),

    /// Extension not in the supported set
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Container unreadable or corrupt
    #[error("Could not read {}: {reason}", path.display())]
    ParseFailure { path: PathBuf, reason: String },

    /// Tag set rejected or save failed
    #[error("Could not write {tag}: {reason}")]
    WriteFailure { tag: String, reason: String },

    /// External encoder, romanizer or lookup capability is absent
    #[error("Missing capability: {0}")]
    CapabilityMissing(String),

    /// Lookup service unreachable or returned a non-200 status
    #[error("Network error: {0}")]
    NetworkFailure(String),

    #[error("Canceled by user")]
    UserCanceled,

    /// Another batch operation is already in progress
    #[error("Another operation is already in progress. Please wait for the previous one to finish.")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TagfixError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ParseFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn write(tag: impl ToString, reason: impl ToString) -> Self {
        Self::WriteFailure {
            tag: tag.to_string(),
            reason: reason.to_string(),
        }
    }
}
