//! In-memory implementation of the release storage trait
//!
//! Suitable for development, tests and single-process deployments.
//! Production deployments should use a persistent backend behind the same
//! trait. Per-name linearizability comes from the concurrent map's per-key
//! locking: all revisions of a name live under one entry.

use crate::error::{Result, StoreError};
use crate::storage::ReleaseStorage;
use async_trait::async_trait;
use dashmap::DashMap;
use moor_types::Release;
use std::collections::BTreeMap;

/// In-memory release storage
pub struct InMemoryReleaseStorage {
    /// name -> version -> revision
    releases: DashMap<String, BTreeMap<u32, Release>>,
}

impl InMemoryReleaseStorage {
    pub fn new() -> Self {
        Self {
            releases: DashMap::new(),
        }
    }

    /// Number of stored revisions across all names.
    pub fn revision_count(&self) -> usize {
        self.releases.iter().map(|e| e.value().len()).sum()
    }
}

impl Default for InMemoryReleaseStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReleaseStorage for InMemoryReleaseStorage {
    async fn get(&self, name: &str, version: u32) -> Result<Release> {
        let revisions = self
            .releases
            .get(name)
            .ok_or_else(|| StoreError::ReleaseNotFound(name.to_string()))?;
        revisions
            .get(&version)
            .cloned()
            .ok_or_else(|| StoreError::VersionNotFound {
                name: name.to_string(),
                version,
            })
    }

    async fn latest(&self, name: &str) -> Result<Release> {
        let revisions = self
            .releases
            .get(name)
            .ok_or_else(|| StoreError::ReleaseNotFound(name.to_string()))?;
        revisions
            .values()
            .next_back()
            .cloned()
            .ok_or_else(|| StoreError::ReleaseNotFound(name.to_string()))
    }

    async fn create(&self, release: Release) -> Result<()> {
        let mut revisions = self.releases.entry(release.name.clone()).or_default();
        if revisions.contains_key(&release.version) {
            return Err(StoreError::AlreadyExists {
                name: release.name,
                version: release.version,
            });
        }
        revisions.insert(release.version, release);
        Ok(())
    }

    async fn update(&self, release: Release) -> Result<()> {
        let mut revisions = self
            .releases
            .get_mut(&release.name)
            .ok_or_else(|| StoreError::ReleaseNotFound(release.name.clone()))?;
        match revisions.get_mut(&release.version) {
            Some(existing) => {
                *existing = release;
                Ok(())
            }
            None => Err(StoreError::VersionNotFound {
                name: release.name.clone(),
                version: release.version,
            }),
        }
    }

    async fn history(&self, name: &str) -> Result<Vec<Release>> {
        let revisions = self
            .releases
            .get(name)
            .ok_or_else(|| StoreError::ReleaseNotFound(name.to_string()))?;
        Ok(revisions.values().rev().cloned().collect())
    }

    async fn list(&self) -> Result<Vec<Release>> {
        Ok(self
            .releases
            .iter()
            .flat_map(|e| e.value().values().cloned().collect::<Vec<_>>())
            .collect())
    }

    async fn purge(&self, name: &str) -> Result<Vec<Release>> {
        match self.releases.remove(name) {
            Some((_, revisions)) => Ok(revisions.into_values().rev().collect()),
            None => Err(StoreError::ReleaseNotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moor_types::{Chart, ReleaseStatus};

    fn release(name: &str, version: u32, status: ReleaseStatus) -> Release {
        Release::new(
            name,
            "default",
            version,
            Chart::new(name, "1.0.0"),
            serde_json::Value::Null,
            status,
        )
    }

    #[tokio::test]
    async fn create_then_read_back() {
        let storage = InMemoryReleaseStorage::new();
        storage
            .create(release("web", 1, ReleaseStatus::Deployed))
            .await
            .unwrap();

        let loaded = storage.get("web", 1).await.unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(storage.latest("web").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn duplicate_version_is_rejected() {
        let storage = InMemoryReleaseStorage::new();
        storage
            .create(release("web", 1, ReleaseStatus::Deployed))
            .await
            .unwrap();

        let err = storage
            .create(release("web", 1, ReleaseStatus::PendingUpgrade))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { version: 1, .. }));
        assert_eq!(storage.revision_count(), 1);
    }

    #[tokio::test]
    async fn latest_tracks_highest_version() {
        let storage = InMemoryReleaseStorage::new();
        for version in 1..=3 {
            let status = if version == 3 {
                ReleaseStatus::Deployed
            } else {
                ReleaseStatus::Superseded
            };
            storage.create(release("web", version, status)).await.unwrap();
        }

        assert_eq!(storage.latest("web").await.unwrap().version, 3);

        let history = storage.history("web").await.unwrap();
        let versions: Vec<u32> = history.iter().map(|r| r.version).collect();
        assert_eq!(versions, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn update_transitions_status_only_for_existing_revisions() {
        let storage = InMemoryReleaseStorage::new();
        storage
            .create(release("web", 1, ReleaseStatus::PendingInstall))
            .await
            .unwrap();

        let mut deployed = storage.get("web", 1).await.unwrap();
        deployed.set_status(ReleaseStatus::Deployed);
        storage.update(deployed).await.unwrap();
        assert_eq!(
            storage.get("web", 1).await.unwrap().status(),
            ReleaseStatus::Deployed
        );

        let err = storage
            .update(release("web", 9, ReleaseStatus::Deployed))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionNotFound { version: 9, .. }));
    }

    #[tokio::test]
    async fn purge_frees_the_name() {
        let storage = InMemoryReleaseStorage::new();
        storage
            .create(release("web", 1, ReleaseStatus::Uninstalled))
            .await
            .unwrap();

        let removed = storage.purge("web").await.unwrap();
        assert_eq!(removed.len(), 1);
        assert!(matches!(
            storage.latest("web").await.unwrap_err(),
            StoreError::ReleaseNotFound(_)
        ));

        // A purged name accepts version 1 again.
        storage
            .create(release("web", 1, ReleaseStatus::PendingInstall))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let storage = InMemoryReleaseStorage::new();
        assert!(matches!(
            storage.get("ghost", 1).await.unwrap_err(),
            StoreError::ReleaseNotFound(_)
        ));
        assert!(matches!(
            storage.history("ghost").await.unwrap_err(),
            StoreError::ReleaseNotFound(_)
        ));
    }
}
