//! Ordered execution of one hook phase

use crate::error::{HookError, Result};
use moor_cluster::{ClusterClient, ClusterError};
use moor_types::{Hook, HookDeletePolicy, HookEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Executes the hooks of a single lifecycle phase
pub struct HookExecutor {
    client: Arc<dyn ClusterClient>,
}

impl HookExecutor {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// Hooks that fire on `event`, in execution order.
    ///
    /// Sort is by ascending weight; `sort_by_key` is stable, so declaration
    /// order breaks ties. Also used by dry-run to report the hook plan
    /// without executing it.
    pub fn plan(hooks: &[Hook], event: HookEvent) -> Vec<Hook> {
        let mut selected: Vec<Hook> = hooks
            .iter()
            .filter(|h| h.fires_on(event))
            .cloned()
            .collect();
        selected.sort_by_key(|h| h.weight);
        selected
    }

    /// Run every hook for `event` within the operation's remaining budget.
    ///
    /// Each hook is bounded by what is left of `budget` when it starts. The
    /// first failure aborts the remaining hooks of the phase. Callers that
    /// have hooks disabled skip this entirely.
    pub async fn execute(
        &self,
        namespace: &str,
        hooks: &[Hook],
        event: HookEvent,
        budget: Duration,
    ) -> Result<()> {
        let selected = Self::plan(hooks, event);
        if selected.is_empty() {
            return Ok(());
        }

        let deadline = Instant::now() + budget;
        info!(
            namespace = namespace,
            event = ?event,
            hooks = selected.len(),
            "Executing hook phase"
        );

        for hook in &selected {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(HookError::TimedOut {
                    hook: hook.name.clone(),
                });
            }

            if hook.delete_policy == HookDeletePolicy::BeforeCreate {
                match self.client.delete(namespace, &hook.reference()).await {
                    Ok(()) | Err(ClusterError::ResourceNotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }

            let resource = hook.resource();
            match self
                .client
                .run_to_completion(namespace, &resource, remaining)
                .await
            {
                Ok(()) => {
                    debug!(hook = %hook.name, "Hook completed");
                    if hook.delete_policy == HookDeletePolicy::OnSucceeded {
                        if let Err(e) = self.client.delete(namespace, &hook.reference()).await {
                            warn!(hook = %hook.name, error = %e, "Post-hook delete failed");
                        }
                    }
                }
                Err(ClusterError::ExecutionTimedOut { .. }) => {
                    return Err(HookError::TimedOut {
                        hook: hook.name.clone(),
                    });
                }
                Err(ClusterError::ExecutionFailed { reason, .. }) => {
                    return Err(HookError::Failed {
                        hook: hook.name.clone(),
                        reason,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}
