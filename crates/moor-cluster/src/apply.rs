//! Ordered apply of a diff plan
//!
//! Creates and updates land first, then deletes of resources absent from
//! the new set. `recreate` turns updates into delete-then-create to force
//! restart semantics. With `wait`, readiness is polled after the apply;
//! on failure, `cleanup_on_fail` rolls back resources this operation
//! created before the error surfaces.

use crate::client::ClusterClient;
use crate::diff::DiffPlan;
use crate::error::{ApplyError, ClusterError};
use moor_types::ResourceRef;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options controlling one apply pass
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Delete-then-create resources that already exist
    pub recreate: bool,

    /// Poll readiness after applying
    pub wait: bool,

    /// Budget for readiness polling
    pub timeout: Duration,

    /// Delete resources created by this operation if it fails
    pub cleanup_on_fail: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            recreate: false,
            wait: false,
            timeout: Duration::from_secs(300),
            cleanup_on_fail: false,
        }
    }
}

/// Applies diff plans through the cluster capability
pub struct ApplyEngine {
    client: Arc<dyn ClusterClient>,
}

impl ApplyEngine {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// Apply a plan to the given namespace.
    pub async fn apply(
        &self,
        namespace: &str,
        plan: &DiffPlan,
        options: &ApplyOptions,
    ) -> Result<(), ApplyError> {
        let total = plan.len();
        let mut applied = 0usize;
        let mut created: Vec<ResourceRef> = Vec::new();

        for resource in &plan.creates {
            if let Err(e) = self.client.create(namespace, resource).await {
                return Err(self.fail(namespace, e.into(), applied, total, &created, options).await);
            }
            created.push(resource.reference());
            applied += 1;
        }

        for resource in &plan.updates {
            let result = if options.recreate {
                self.recreate(namespace, resource).await
            } else {
                self.client.update(namespace, resource).await
            };
            if let Err(e) = result {
                return Err(self.fail(namespace, e.into(), applied, total, &created, options).await);
            }
            if options.recreate {
                created.push(resource.reference());
            }
            applied += 1;
        }

        for reference in &plan.deletes {
            match self.client.delete(namespace, reference).await {
                Ok(()) => applied += 1,
                // Already gone is the state we wanted.
                Err(ClusterError::ResourceNotFound(_)) => {
                    debug!(resource = %reference, "Skipping delete of absent resource");
                    applied += 1;
                }
                Err(e) => {
                    return Err(self
                        .fail(namespace, e.into(), applied, total, &created, options)
                        .await);
                }
            }
        }

        if options.wait {
            let expected = plan.expected();
            if let Err(e) = self
                .client
                .wait_ready(namespace, &expected, options.timeout)
                .await
            {
                self.cleanup(namespace, &created, options).await;
                return Err(match e {
                    ClusterError::NotReady { .. } => ApplyError::WaitTimeout(options.timeout),
                    other => ApplyError::Cluster(other),
                });
            }
        }

        info!(namespace = namespace, resources = total, "Apply completed");
        Ok(())
    }

    /// Delete-then-create for restart semantics.
    async fn recreate(
        &self,
        namespace: &str,
        resource: &moor_types::Resource,
    ) -> Result<(), ClusterError> {
        match self.client.delete(namespace, &resource.reference()).await {
            Ok(()) | Err(ClusterError::ResourceNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.client.create(namespace, resource).await
    }

    async fn fail(
        &self,
        namespace: &str,
        error: ApplyError,
        applied: usize,
        total: usize,
        created: &[ResourceRef],
        options: &ApplyOptions,
    ) -> ApplyError {
        self.cleanup(namespace, created, options).await;
        if applied > 0 {
            ApplyError::Partial {
                applied,
                total,
                reason: error.to_string(),
            }
        } else {
            error
        }
    }

    async fn cleanup(&self, namespace: &str, created: &[ResourceRef], options: &ApplyOptions) {
        if !options.cleanup_on_fail || created.is_empty() {
            return;
        }
        info!(
            namespace = namespace,
            resources = created.len(),
            "Cleaning up resources created by failed operation"
        );
        for reference in created {
            if let Err(e) = self.client.delete(namespace, reference).await {
                warn!(resource = %reference, error = %e, "Cleanup delete failed");
            }
        }
    }
}
