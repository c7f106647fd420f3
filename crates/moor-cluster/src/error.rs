//! Error types for cluster operations

use moor_types::ResourceRef;
use std::time::Duration;
use thiserror::Error;

/// Error from the cluster capability
#[derive(Debug, Clone, Error)]
pub enum ClusterError {
    /// A create/update/delete call was rejected
    #[error("apply failed for {reference}: {reason}")]
    ApplyFailed {
        /// Resource the call targeted
        reference: ResourceRef,
        /// Implementation-specific reason
        reason: String,
    },

    /// The resource does not exist on the cluster
    #[error("resource {0} not found")]
    ResourceNotFound(ResourceRef),

    /// Resources did not reach readiness in time
    #[error("resources not ready after {elapsed:?}: {pending} still pending")]
    NotReady {
        /// How long readiness was polled for
        elapsed: Duration,
        /// Number of resources still unready
        pending: usize,
    },

    /// A hook or test resource finished unsuccessfully
    #[error("execution of {reference} failed: {reason}")]
    ExecutionFailed {
        /// Resource that was run
        reference: ResourceRef,
        /// Implementation-specific reason
        reason: String,
    },

    /// A hook or test resource exceeded its budget
    #[error("execution of {reference} did not complete within {budget:?}")]
    ExecutionTimedOut {
        /// Resource that was run
        reference: ResourceRef,
        /// Budget it was given
        budget: Duration,
    },
}

/// Error from the apply engine
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The delta could not be applied at all
    #[error("cluster apply failed: {0}")]
    Cluster(#[from] ClusterError),

    /// Some resources applied before the failure
    ///
    /// When cleanup-on-fail is set, resources created by the failed
    /// operation have already been deleted by the time this surfaces.
    #[error("applied {applied} of {total} resources before failure: {reason}")]
    Partial {
        /// Resources applied before the failure
        applied: usize,
        /// Resources the plan contained
        total: usize,
        /// Underlying failure
        reason: String,
    },

    /// Readiness polling exhausted the operation budget
    #[error("resources not ready within {0:?}")]
    WaitTimeout(Duration),
}

/// Result type for cluster operations
pub type Result<T, E = ClusterError> = std::result::Result<T, E>;
