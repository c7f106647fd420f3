//! Error types for hook execution

use moor_cluster::ClusterError;
use thiserror::Error;

/// Hook execution error
#[derive(Debug, Error)]
pub enum HookError {
    /// A hook ran and finished unsuccessfully
    #[error("hook {hook} failed: {reason}")]
    Failed {
        /// Hook name
        hook: String,
        /// Underlying reason
        reason: String,
    },

    /// A hook exhausted the operation's remaining timeout budget
    #[error("hook {hook} exceeded the remaining operation budget")]
    TimedOut {
        /// Hook name
        hook: String,
    },

    /// The cluster rejected a hook resource operation
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// Result type for hook operations
pub type Result<T> = std::result::Result<T, HookError>;
