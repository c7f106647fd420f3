//! Storage contract for release revisions

use crate::error::Result;
use async_trait::async_trait;
use moor_types::Release;

/// Durable keyed storage of release revisions
///
/// Implementations must be linearizable per release name: a `create` or
/// `update` that has returned is visible to every subsequent read. History
/// is append-only; `update` may only transition the status/info of an
/// existing revision, never its content.
#[async_trait]
pub trait ReleaseStorage: Send + Sync {
    /// Fetch one revision by name and version.
    async fn get(&self, name: &str, version: u32) -> Result<Release>;

    /// Fetch the highest-versioned revision for a name.
    async fn latest(&self, name: &str) -> Result<Release>;

    /// Append a new revision.
    ///
    /// Fails with [`StoreError::AlreadyExists`](crate::StoreError) when the
    /// name already has that version, enforcing the monotonic invariant.
    async fn create(&self, release: Release) -> Result<()>;

    /// Replace an existing revision (status/info transitions only).
    async fn update(&self, release: Release) -> Result<()>;

    /// All revisions for a name, descending by version.
    async fn history(&self, name: &str) -> Result<Vec<Release>>;

    /// Every stored revision, for the query layer.
    async fn list(&self) -> Result<Vec<Release>>;

    /// Remove every revision for a name, freeing it for reuse.
    ///
    /// Returns the removed revisions, newest first.
    async fn purge(&self, name: &str) -> Result<Vec<Release>>;
}
