//! Cluster capability trait

use crate::error::Result;
use async_trait::async_trait;
use moor_types::{Resource, ResourceRef};
use std::time::Duration;

/// Capability trait for everything the core asks of a cluster
///
/// Implementations wrap a real cluster API; the engine only assumes calls
/// are slow, remote and may fail partway. All methods take the namespace
/// explicitly because a release is bound to one.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create a resource from its rendered manifest.
    async fn create(&self, namespace: &str, resource: &Resource) -> Result<()>;

    /// Update an existing resource to a new manifest.
    async fn update(&self, namespace: &str, resource: &Resource) -> Result<()>;

    /// Delete a resource.
    ///
    /// Deleting a resource that does not exist is reported as
    /// [`ClusterError::ResourceNotFound`](crate::ClusterError); callers
    /// decide whether that matters.
    async fn delete(&self, namespace: &str, reference: &ResourceRef) -> Result<()>;

    /// Poll until every listed resource reports ready, or the timeout
    /// elapses.
    async fn wait_ready(
        &self,
        namespace: &str,
        references: &[ResourceRef],
        timeout: Duration,
    ) -> Result<()>;

    /// Create a hook/test resource and block until it runs to completion
    /// or the budget elapses. The resource is left in place afterwards.
    async fn run_to_completion(
        &self,
        namespace: &str,
        resource: &Resource,
        budget: Duration,
    ) -> Result<()>;
}
