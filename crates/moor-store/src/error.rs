//! Error types for release storage

use thiserror::Error;

/// Storage error type
#[derive(Debug, Error)]
pub enum StoreError {
    /// No revision exists for the name
    #[error("release {0} not found")]
    ReleaseNotFound(String),

    /// The name exists but not at the requested version
    #[error("release {name} version {version} not found")]
    VersionNotFound {
        /// Release name
        name: String,
        /// Requested version
        version: u32,
    },

    /// Appending would duplicate an existing version
    #[error("release {name} version {version} already exists")]
    AlreadyExists {
        /// Release name
        name: String,
        /// Conflicting version
        version: u32,
    },

    /// List offset key does not match any release under the current sort
    #[error("list offset {0:?} not found")]
    OffsetNotFound(String),

    /// Name filter is not a valid regular expression
    #[error("invalid release filter: {0}")]
    InvalidFilter(#[from] regex::Error),
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StoreError>;
