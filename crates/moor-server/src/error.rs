//! Error types for the release server

use moor_cluster::ApplyError;
use moor_hooks::HookError;
use moor_store::StoreError;
use moor_types::{Operation, ReleaseStatus, TransitionError};
use std::time::Duration;
use thiserror::Error;

/// Release server error type
#[derive(Debug, Error)]
pub enum ServerError {
    /// Install collision: the name has history and reuse was not requested
    #[error("release {0} already exists")]
    AlreadyExists(String),

    /// The coordinator holds a lease for the name
    #[error("a {operation} operation is already in progress for release {name}")]
    Busy {
        /// Contended release name
        name: String,
        /// Operation holding the lease
        operation: Operation,
    },

    /// The status transition table rejected the operation
    #[error(transparent)]
    InvalidState(#[from] TransitionError),

    /// Rollback aimed at the current live version
    #[error("rollback of {name} to version {version} targets the current live version")]
    RollbackToLive {
        /// Release name
        name: String,
        /// Requested version
        version: u32,
    },

    /// Rollback aimed at a revision that cannot be restored
    #[error(
        "rollback target {name} version {version} has status {status}; \
         only superseded, failed or uninstalled revisions can be restored"
    )]
    InvalidRollbackTarget {
        /// Release name
        name: String,
        /// Requested version
        version: u32,
        /// Status of the requested revision
        status: ReleaseStatus,
    },

    /// Rollback with version 0 but only one revision in history
    #[error("release {0} has no previous revision to roll back to")]
    NoPreviousRevision(String),

    /// The operation exceeded the caller-supplied budget
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A non-disabled hook failed
    #[error("hook execution failed: {0}")]
    Hook(#[from] HookError),

    /// The cluster apply/diff step failed
    #[error("cluster apply failed: {0}")]
    Apply(#[from] ApplyError),

    /// Storage subsystem error
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;
