//! Main ReleaseServer implementation
//!
//! The ReleaseServer is the unified entry point for the release RPC
//! surface. Mutating operations are admitted by the operation coordinator,
//! run the hook/apply pipeline against the cluster capability, and persist
//! their outcome in the release store. Read-only operations bypass the
//! coordinator and read the store directly.

use crate::coordinator::OperationCoordinator;
use crate::error::{Result, ServerError};
use crate::events::ReleaseEvent;
use crate::options::{InstallOptions, RollbackOptions, UninstallOptions, UpgradeOptions};
use chrono::Utc;
use moor_cluster::{diff, ApplyEngine, ApplyOptions, ClusterClient, DiffPlan};
use moor_hooks::{HookExecutor, TestEvent, TestOptions, TestRunner};
use moor_store::{list_latest, ListPage, ListQuery, ReleaseStorage, StoreError};
use moor_types::{
    next_pending, Chart, Operation, Release, ReleaseInfo, ReleaseStatus, FIRST_VERSION,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Status information for one revision, without its content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseStatusResponse {
    pub name: String,
    pub namespace: String,
    pub version: u32,
    pub info: ReleaseInfo,
}

/// Outcome of an uninstall
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UninstallResponse {
    /// The final revision, status `Uninstalled`
    pub release: Release,
    /// Human-readable summary of what was removed
    pub message: String,
}

/// Release lifecycle server
pub struct ReleaseServer {
    /// Durable revision storage
    storage: Arc<dyn ReleaseStorage>,
    /// Hook phase executor
    hooks: HookExecutor,
    /// Diff apply engine
    engine: ApplyEngine,
    /// Release test runner
    tests: TestRunner,
    /// Per-name lease coordinator
    coordinator: OperationCoordinator,
    /// Lifecycle event channel
    event_tx: broadcast::Sender<ReleaseEvent>,
}

impl ReleaseServer {
    /// Create a server over a store and a cluster capability.
    pub fn new(storage: Arc<dyn ReleaseStorage>, cluster: Arc<dyn ClusterClient>) -> Self {
        let (event_tx, _) = broadcast::channel(4096);
        Self {
            storage,
            hooks: HookExecutor::new(cluster.clone()),
            engine: ApplyEngine::new(cluster.clone()),
            tests: TestRunner::new(cluster),
            coordinator: OperationCoordinator::new(),
            event_tx,
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ReleaseEvent> {
        self.event_tx.subscribe()
    }

    /// Server version; touches no release state.
    pub fn get_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    // ========== Read-only operations ==========

    /// Status of one revision; `version = 0` means latest.
    pub async fn get_release_status(
        &self,
        name: &str,
        version: u32,
    ) -> Result<ReleaseStatusResponse> {
        let release = self.fetch(name, version).await?;
        Ok(ReleaseStatusResponse {
            name: release.name,
            namespace: release.namespace,
            version: release.version,
            info: release.info,
        })
    }

    /// Full content of one revision; `version = 0` means latest.
    pub async fn get_release_content(&self, name: &str, version: u32) -> Result<Release> {
        self.fetch(name, version).await
    }

    /// Revision history for a name, descending by version.
    ///
    /// `max = 0` returns everything; otherwise the `max` most recent.
    pub async fn get_history(&self, name: &str, max: usize) -> Result<Vec<Release>> {
        let mut history = self.storage.history(name).await?;
        if max > 0 {
            history.truncate(max);
        }
        Ok(history)
    }

    /// One page of the latest revision per matching name.
    pub async fn list_releases(&self, query: &ListQuery) -> Result<ListPage> {
        Ok(list_latest(self.storage.as_ref(), query).await?)
    }

    /// Stream pages until the result set is exhausted or the consumer
    /// drops the receiver. Each page recomputes from current store state.
    pub fn stream_releases(&self, query: ListQuery) -> mpsc::Receiver<Result<ListPage>> {
        let (tx, rx) = mpsc::channel(8);
        let storage = self.storage.clone();
        let mut query = query;
        tokio::spawn(async move {
            loop {
                let page = match list_latest(storage.as_ref(), &query).await {
                    Ok(page) => page,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        break;
                    }
                };
                let next = page.next.clone();
                let exhausted = next.is_empty() || page.count == 0;
                if tx.send(Ok(page)).await.is_err() || exhausted {
                    break;
                }
                query.offset = next;
            }
        });
        rx
    }

    // ========== Mutating operations ==========

    /// Install a chart as a new release.
    #[instrument(skip(self, chart, values, options), fields(chart = %chart.metadata.name))]
    pub async fn install_release(
        &self,
        chart: Chart,
        values: Value,
        options: InstallOptions,
    ) -> Result<Release> {
        // 1. Resolve the release name.
        let name = if options.name.is_empty() {
            self.generate_name(&chart).await?
        } else {
            options.name.clone()
        };

        // 2. Dry run: same computation, no lease, no side effects.
        if options.dry_run {
            let (release, _plan) = self.prepare_install(&name, chart, values, &options).await?;
            return Ok(release);
        }

        // 3. Admit the operation.
        let _lease = self.coordinator.acquire(&name, Operation::Install)?;

        // 4. Build and persist the pending revision.
        let (release, plan) = self.prepare_install(&name, chart, values, &options).await?;
        self.storage.create(release.clone()).await?;

        // 5. Run hooks and apply under the caller's budget.
        let apply_options = ApplyOptions {
            recreate: false,
            wait: options.wait,
            timeout: options.timeout,
            cleanup_on_fail: false,
        };
        let outcome = self
            .run_lifecycle(
                &release,
                &plan,
                Operation::Install,
                options.disable_hooks,
                apply_options,
                options.timeout,
            )
            .await;

        // 6. Record the terminal status.
        let version = release.version;
        self.complete(
            release,
            Operation::Install,
            outcome,
            describe(&options.description, "Install complete"),
            ReleaseEvent::Installed {
                name: name.clone(),
                version,
            },
        )
        .await
    }

    /// Upgrade an existing release to a new chart and values.
    #[instrument(skip(self, chart, values, options), fields(release = name))]
    pub async fn update_release(
        &self,
        name: &str,
        chart: Chart,
        values: Value,
        options: UpgradeOptions,
    ) -> Result<Release> {
        // 1. Dry run: same computation, no lease, no side effects.
        if options.dry_run {
            let (release, _prior, _plan) = self.prepare_upgrade(name, chart, values, &options).await?;
            return Ok(release);
        }

        // 2. Admit the operation, then read under the lease.
        let _lease = self.coordinator.acquire(name, Operation::Upgrade)?;
        let (release, prior, plan) = self.prepare_upgrade(name, chart, values, &options).await?;

        // 3. Retire the live revision and persist the pending one.
        self.supersede(&prior).await?;
        self.storage.create(release.clone()).await?;

        // 4. Run hooks and apply under the caller's budget.
        let apply_options = ApplyOptions {
            recreate: options.recreate,
            wait: options.wait,
            timeout: options.timeout,
            cleanup_on_fail: options.cleanup_on_fail || options.force,
        };
        let outcome = self
            .run_lifecycle(
                &release,
                &plan,
                Operation::Upgrade,
                options.disable_hooks,
                apply_options,
                options.timeout,
            )
            .await;

        // 5. Record the terminal status.
        let version = release.version;
        self.complete(
            release,
            Operation::Upgrade,
            outcome,
            describe(&options.description, "Upgrade complete"),
            ReleaseEvent::Upgraded {
                name: name.to_string(),
                version,
            },
        )
        .await
    }

    /// Roll a release back to the content of an older revision.
    ///
    /// The target's content is copied into a brand-new revision; history
    /// never rewinds.
    #[instrument(skip(self, options), fields(release = name, target = options.version))]
    pub async fn rollback_release(&self, name: &str, options: RollbackOptions) -> Result<Release> {
        // 1. Dry run: same computation, no lease, no side effects.
        if options.dry_run {
            let (release, _prior, _plan, _target) = self.prepare_rollback(name, &options).await?;
            return Ok(release);
        }

        // 2. Admit the operation, then read under the lease.
        let _lease = self.coordinator.acquire(name, Operation::Rollback)?;
        let (release, prior, plan, target_version) = self.prepare_rollback(name, &options).await?;

        // 3. Retire the live revision and persist the pending one.
        self.supersede(&prior).await?;
        self.storage.create(release.clone()).await?;

        // 4. Run hooks and apply under the caller's budget.
        let apply_options = ApplyOptions {
            recreate: options.recreate,
            wait: options.wait,
            timeout: options.timeout,
            cleanup_on_fail: options.cleanup_on_fail || options.force,
        };
        let outcome = self
            .run_lifecycle(
                &release,
                &plan,
                Operation::Rollback,
                options.disable_hooks,
                apply_options,
                options.timeout,
            )
            .await;

        // 5. Record the terminal status.
        let version = release.version;
        self.complete(
            release,
            Operation::Rollback,
            outcome,
            describe(
                &options.description,
                &format!("Rollback to {target_version}"),
            ),
            ReleaseEvent::RolledBack {
                name: name.to_string(),
                version,
                target: target_version,
            },
        )
        .await
    }

    /// Remove a release from the cluster.
    ///
    /// Without `purge` the history is kept and the name stays reserved;
    /// with it, the whole history is removed and the name freed.
    #[instrument(skip(self, options), fields(release = name, purge = options.purge))]
    pub async fn uninstall_release(
        &self,
        name: &str,
        options: UninstallOptions,
    ) -> Result<UninstallResponse> {
        // 1. Admit the operation.
        let _lease = self.coordinator.acquire(name, Operation::Uninstall)?;

        // 2. Move the latest revision into Uninstalling.
        let prior = self.storage.latest(name).await?;
        let status = next_pending(prior.status(), Operation::Uninstall)?;
        let mut release = prior;
        release.info.status = status;
        self.storage.update(release.clone()).await?;

        // 3. Delete hooks bracket the removal of the full resource set.
        let plan = diff(&release.chart.resources, &[]);
        let deletes = plan.deletes.len();
        let apply_options = ApplyOptions {
            timeout: options.timeout,
            ..Default::default()
        };
        let outcome = self
            .run_lifecycle(
                &release,
                &plan,
                Operation::Uninstall,
                options.disable_hooks,
                apply_options,
                options.timeout,
            )
            .await;

        // 4. Record the terminal status.
        match outcome {
            Ok(()) => {
                release.info.status = ReleaseStatus::Uninstalled;
                release.info.deleted = Some(Utc::now());
                release.info.description =
                    describe(&options.description, "Uninstallation complete");
                self.storage.update(release.clone()).await?;
                if options.purge {
                    self.storage.purge(name).await?;
                }
                self.emit(ReleaseEvent::Uninstalled {
                    name: name.to_string(),
                    purged: options.purge,
                });
                info!(release = %release.key(), purge = options.purge, "Release uninstalled");
                Ok(UninstallResponse {
                    release,
                    message: format!("{deletes} resources deleted"),
                })
            }
            Err(e) => {
                release.info.status = ReleaseStatus::Failed;
                release.info.description = e.to_string();
                if let Err(update_err) = self.storage.update(release.clone()).await {
                    warn!(release = %release.key(), error = %update_err, "Failed to record failed revision");
                }
                self.emit(ReleaseEvent::OperationFailed {
                    name: name.to_string(),
                    operation: Operation::Uninstall,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run the release's test hooks, streaming results.
    ///
    /// The coordinator lease is held until the stream finishes, so tests
    /// serialize with other mutations of the same name.
    #[instrument(skip(self, options), fields(release = name))]
    pub async fn run_release_test(
        &self,
        name: &str,
        options: TestOptions,
    ) -> Result<mpsc::Receiver<TestEvent>> {
        // Lease first: the transition check and the pending write must see
        // a latest revision no concurrent mutation can replace.
        let lease = self.coordinator.acquire(name, Operation::Test)?;
        let release = self.storage.latest(name).await?;
        let pending = next_pending(release.status(), Operation::Test)?;

        // Status side-channel applies only while the release is still on
        // the cluster; an uninstalled release keeps its status.
        let record_status = matches!(
            release.status(),
            ReleaseStatus::Deployed | ReleaseStatus::Tested
        );
        if record_status {
            let mut pending_release = release.clone();
            pending_release.info.status = pending;
            self.storage.update(pending_release).await?;
        }

        let (tx, rx) = mpsc::channel(32);
        let runner = self.tests.clone();
        let storage = self.storage.clone();
        let event_tx = self.event_tx.clone();
        let mut release = release;
        let name = name.to_string();
        tokio::spawn(async move {
            let _lease = lease;
            let passed = runner
                .execute(tx, &release.namespace, &release.hooks, &options)
                .await;
            if record_status {
                release.info.status = if passed {
                    ReleaseStatus::Tested
                } else {
                    ReleaseStatus::Failed
                };
                if let Err(e) = storage.update(release.clone()).await {
                    warn!(release = %release.key(), error = %e, "Failed to record test outcome");
                }
            }
            let _ = event_tx.send(ReleaseEvent::TestCompleted { name, passed });
        });
        Ok(rx)
    }

    // ========== Internal ==========

    async fn fetch(&self, name: &str, version: u32) -> Result<Release> {
        if version == 0 {
            Ok(self.storage.latest(name).await?)
        } else {
            Ok(self.storage.get(name, version).await?)
        }
    }

    /// Build the pending revision and plan for an install.
    async fn prepare_install(
        &self,
        name: &str,
        chart: Chart,
        values: Value,
        options: &InstallOptions,
    ) -> Result<(Release, DiffPlan)> {
        let current = match self.storage.latest(name).await {
            Ok(latest) => {
                if latest.status() != ReleaseStatus::Uninstalled || !options.reuse_name {
                    return Err(ServerError::AlreadyExists(name.to_string()));
                }
                Some(latest)
            }
            Err(StoreError::ReleaseNotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let current_status = current
            .as_ref()
            .map(|r| r.status())
            .unwrap_or(ReleaseStatus::Unknown);
        let status = next_pending(current_status, Operation::Install)?;
        let version = current
            .as_ref()
            .map(|r| r.version + 1)
            .unwrap_or(FIRST_VERSION);

        let plan = diff(&[], &chart.resources);
        let mut release = Release::new(name, &options.namespace, version, chart, values, status);
        release.info.description = describe(&options.description, "Install in progress");
        release.info.notes = plan_notes(&release, Operation::Install, &plan);
        Ok((release, plan))
    }

    /// Build the pending revision and plan for an upgrade.
    async fn prepare_upgrade(
        &self,
        name: &str,
        chart: Chart,
        values: Value,
        options: &UpgradeOptions,
    ) -> Result<(Release, Release, DiffPlan)> {
        let prior = self.storage.latest(name).await?;
        let status = next_pending(prior.status(), Operation::Upgrade)?;

        let config = resolve_values(
            &prior.config,
            values,
            options.reset_values,
            options.reuse_values,
        );
        let plan = diff(&prior.chart.resources, &chart.resources);

        let mut release = Release::new(
            name,
            &prior.namespace,
            prior.version + 1,
            chart,
            config,
            status,
        );
        release.info.first_deployed = prior.info.first_deployed;
        release.info.description = describe(&options.description, "Upgrade in progress");
        release.info.notes = plan_notes(&release, Operation::Upgrade, &plan);
        Ok((release, prior, plan))
    }

    /// Build the pending revision and plan for a rollback.
    async fn prepare_rollback(
        &self,
        name: &str,
        options: &RollbackOptions,
    ) -> Result<(Release, Release, DiffPlan, u32)> {
        let prior = self.storage.latest(name).await?;
        let status = next_pending(prior.status(), Operation::Rollback)?;

        let target_version = if options.version == 0 {
            if prior.version <= FIRST_VERSION {
                return Err(ServerError::NoPreviousRevision(name.to_string()));
            }
            prior.version - 1
        } else {
            options.version
        };
        if target_version == prior.version {
            return Err(ServerError::RollbackToLive {
                name: name.to_string(),
                version: target_version,
            });
        }

        let target = self.storage.get(name, target_version).await?;
        if !target.status().is_rollback_target() {
            return Err(ServerError::InvalidRollbackTarget {
                name: name.to_string(),
                version: target_version,
                status: target.status(),
            });
        }

        let plan = diff(&prior.chart.resources, &target.chart.resources);
        let mut release = Release::new(
            name,
            &prior.namespace,
            prior.version + 1,
            target.chart.clone(),
            target.config.clone(),
            status,
        );
        release.info.first_deployed = prior.info.first_deployed;
        release.info.description = describe(
            &options.description,
            &format!("Rollback to {target_version}"),
        );
        release.info.notes = plan_notes(&release, Operation::Rollback, &plan);
        Ok((release, prior, plan, target_version))
    }

    /// Mark the live revision superseded before a replacement goes in.
    async fn supersede(&self, prior: &Release) -> Result<()> {
        if matches!(
            prior.status(),
            ReleaseStatus::Deployed | ReleaseStatus::Tested
        ) {
            let mut superseded = prior.clone();
            superseded.info.status = ReleaseStatus::Superseded;
            self.storage.update(superseded).await?;
        }
        Ok(())
    }

    /// Run pre hooks, the apply, and post hooks under one budget.
    ///
    /// On expiry, in-flight cluster work is abandoned best-effort and the
    /// caller records the revision as failed; retry is the caller's call.
    async fn run_lifecycle(
        &self,
        release: &Release,
        plan: &DiffPlan,
        operation: Operation,
        disable_hooks: bool,
        apply_options: ApplyOptions,
        budget: Duration,
    ) -> Result<()> {
        let (pre, post) = match operation.hook_events() {
            Some(events) => events,
            None => return Ok(()),
        };

        let work = async {
            if !disable_hooks {
                self.hooks
                    .execute(&release.namespace, &release.hooks, pre, budget)
                    .await?;
            }
            self.engine
                .apply(&release.namespace, plan, &apply_options)
                .await?;
            if !disable_hooks {
                self.hooks
                    .execute(&release.namespace, &release.hooks, post, budget)
                    .await?;
            }
            Ok::<(), ServerError>(())
        };

        match tokio::time::timeout(budget, work).await {
            Ok(result) => result,
            Err(_) => Err(ServerError::Timeout(budget)),
        }
    }

    /// Record the terminal status of a mutating operation.
    ///
    /// Failures are recorded on the revision before they surface, so
    /// history always reflects the attempt.
    async fn complete(
        &self,
        mut release: Release,
        operation: Operation,
        outcome: Result<()>,
        success_description: String,
        event: ReleaseEvent,
    ) -> Result<Release> {
        match outcome {
            Ok(()) => {
                release.set_status(operation.success_status());
                release.info.description = success_description;
                self.storage.update(release.clone()).await?;
                self.emit(event);
                info!(release = %release.key(), operation = %operation, "Operation complete");
                Ok(release)
            }
            Err(e) => {
                release.set_status(ReleaseStatus::Failed);
                release.info.description = e.to_string();
                if let Err(update_err) = self.storage.update(release.clone()).await {
                    warn!(release = %release.key(), error = %update_err, "Failed to record failed revision");
                }
                self.emit(ReleaseEvent::OperationFailed {
                    name: release.name.clone(),
                    operation,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Generate an unused release name from the chart name.
    async fn generate_name(&self, chart: &Chart) -> Result<String> {
        for _ in 0..8 {
            let suffix = Uuid::new_v4().simple().to_string();
            let name = format!("{}-{}", chart.metadata.name, &suffix[..8]);
            match self.storage.latest(&name).await {
                Err(StoreError::ReleaseNotFound(_)) => return Ok(name),
                Ok(_) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ServerError::AlreadyExists(format!(
            "{}-*",
            chart.metadata.name
        )))
    }

    fn emit(&self, event: ReleaseEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Caller description, or the operation default.
fn describe(custom: &str, fallback: &str) -> String {
    if custom.is_empty() {
        fallback.to_string()
    } else {
        custom.to_string()
    }
}

/// Dry-run-visible summary of the computed diff and hook plan.
fn plan_notes(release: &Release, operation: Operation, plan: &DiffPlan) -> String {
    match operation.hook_events() {
        Some((pre, post)) => {
            let pre_count = HookExecutor::plan(&release.hooks, pre).len();
            let post_count = HookExecutor::plan(&release.hooks, post).len();
            format!(
                "{}; {pre_count} pre hooks, {post_count} post hooks",
                plan.summary()
            )
        }
        None => plan.summary(),
    }
}

/// Resolve the config for an upgrade from the previous revision's config
/// and the incoming values.
fn resolve_values(previous: &Value, incoming: Value, reset: bool, reuse: bool) -> Value {
    if reset {
        return incoming;
    }
    if reuse {
        let mut merged = previous.clone();
        merge_values(&mut merged, incoming);
        return merged;
    }
    let empty = incoming.is_null() || incoming.as_object().is_some_and(|o| o.is_empty());
    if empty {
        previous.clone()
    } else {
        incoming
    }
}

/// Deep merge: objects merge key-wise, everything else is replaced.
fn merge_values(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Object(overlay_map) => {
            if let Value::Object(base_map) = base {
                for (key, value) in overlay_map {
                    match base_map.get_mut(&key) {
                        Some(slot) => merge_values(slot, value),
                        None => {
                            base_map.insert(key, value);
                        }
                    }
                }
            } else {
                *base = Value::Object(overlay_map);
            }
        }
        other => *base = other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moor_cluster::{ClusterOp, MockClusterClient};
    use moor_hooks::TestStatus;
    use moor_store::InMemoryReleaseStorage;
    use moor_types::{Hook, HookEvent, Resource};
    use serde_json::json;

    fn chart_a() -> Chart {
        Chart::new("web-chart", "1.0.0")
            .with_resource(Resource::new("Service", "web-svc", "port: 80"))
            .with_resource(Resource::new("Deployment", "web-dep", "image: web:1"))
    }

    fn chart_b() -> Chart {
        Chart::new("web-chart", "2.0.0")
            .with_resource(Resource::new("Deployment", "web-dep", "image: web:2"))
            .with_resource(Resource::new("ConfigMap", "web-env", "mode: fast"))
    }

    fn harness() -> (
        ReleaseServer,
        Arc<InMemoryReleaseStorage>,
        Arc<MockClusterClient>,
    ) {
        let storage = Arc::new(InMemoryReleaseStorage::new());
        let cluster = Arc::new(MockClusterClient::new());
        let server = ReleaseServer::new(storage.clone(), cluster.clone());
        (server, storage, cluster)
    }

    async fn install(server: &ReleaseServer, name: &str) -> Release {
        server
            .install_release(
                chart_a(),
                json!({"replicas": 2}),
                InstallOptions {
                    name: name.into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
    }

    async fn drain(mut rx: mpsc::Receiver<TestEvent>) -> Vec<TestEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn install_deploys_first_revision() {
        let (server, storage, cluster) = harness();

        let release = install(&server, "web").await;
        assert_eq!(release.version, FIRST_VERSION);
        assert_eq!(release.status(), ReleaseStatus::Deployed);
        assert_eq!(release.info.description, "Install complete");

        let stored = storage.latest("web").await.unwrap();
        assert_eq!(stored.status(), ReleaseStatus::Deployed);

        let ops = cluster.operations();
        assert!(ops.contains(&ClusterOp::create("default", "Service", "web-svc")));
        assert!(ops.contains(&ClusterOp::create("default", "Deployment", "web-dep")));
    }

    #[tokio::test]
    async fn install_rejects_existing_name() {
        let (server, _storage, _cluster) = harness();
        install(&server, "web").await;

        let err = server
            .install_release(
                chart_a(),
                Value::Null,
                InstallOptions {
                    name: "web".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::AlreadyExists(name) if name == "web"));
    }

    #[tokio::test]
    async fn empty_name_generates_one_from_the_chart() {
        let (server, storage, _cluster) = harness();

        let release = server
            .install_release(chart_a(), Value::Null, InstallOptions::default())
            .await
            .unwrap();
        assert!(release.name.starts_with("web-chart-"));
        assert_eq!(release.name.len(), "web-chart-".len() + 8);
        assert!(storage.latest(&release.name).await.is_ok());
    }

    #[tokio::test]
    async fn dry_run_install_has_no_side_effects() {
        let (server, storage, cluster) = harness();

        let release = server
            .install_release(
                chart_a(),
                Value::Null,
                InstallOptions {
                    name: "web".into(),
                    dry_run: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(release.version, FIRST_VERSION);
        assert_eq!(release.status(), ReleaseStatus::PendingInstall);
        assert!(release.info.notes.contains("2 to create"));
        assert_eq!(storage.revision_count(), 0);
        assert_eq!(cluster.mutation_count(), 0);
        assert!(!server.coordinator.is_held("web"));
    }

    #[tokio::test]
    async fn upgrade_supersedes_the_live_revision() {
        let (server, storage, _cluster) = harness();
        install(&server, "web").await;

        let release = server
            .update_release("web", chart_b(), Value::Null, UpgradeOptions::default())
            .await
            .unwrap();
        assert_eq!(release.version, 2);
        assert_eq!(release.status(), ReleaseStatus::Deployed);

        let history = storage.history("web").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, 2);
        assert_eq!(history[1].status(), ReleaseStatus::Superseded);
    }

    #[tokio::test]
    async fn upgrade_applies_the_diff_between_revisions() {
        let (server, _storage, cluster) = harness();
        install(&server, "web").await;

        server
            .update_release("web", chart_b(), Value::Null, UpgradeOptions::default())
            .await
            .unwrap();

        let ops = cluster.operations();
        // Shared resource updated, new one created, removed one deleted.
        assert!(ops.contains(&ClusterOp::update("default", "Deployment", "web-dep")));
        assert!(ops.contains(&ClusterOp::create("default", "ConfigMap", "web-env")));
        assert!(ops.contains(&ClusterOp::delete("default", "Service", "web-svc")));
    }

    #[tokio::test]
    async fn failed_install_does_not_wedge_the_name() {
        let (server, storage, cluster) = harness();
        cluster.fail_create("web-svc");

        let err = server
            .install_release(
                chart_a(),
                Value::Null,
                InstallOptions {
                    name: "web".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Apply(_)));

        let failed = storage.latest("web").await.unwrap();
        assert_eq!(failed.status(), ReleaseStatus::Failed);
        assert!(!failed.info.description.is_empty());

        // An upgrade over the failed revision repairs the release.
        let repaired = server
            .update_release("web", chart_b(), Value::Null, UpgradeOptions::default())
            .await
            .unwrap();
        assert_eq!(repaired.version, 2);
        assert_eq!(repaired.status(), ReleaseStatus::Deployed);

        let versions: Vec<u32> = storage
            .history("web")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec![2, 1]);
    }

    #[tokio::test]
    async fn rollback_restores_the_target_content_as_a_new_revision() {
        let (server, storage, _cluster) = harness();
        install(&server, "web").await;
        server
            .update_release("web", chart_b(), json!({"replicas": 4}), UpgradeOptions::default())
            .await
            .unwrap();

        let release = server
            .rollback_release(
                "web",
                RollbackOptions {
                    version: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(release.version, 3);
        assert_eq!(release.status(), ReleaseStatus::Deployed);
        assert_eq!(release.chart.metadata.version, "1.0.0");
        assert_eq!(release.config, json!({"replicas": 2}));
        assert_eq!(release.info.description, "Rollback to 1");

        let history = storage.history("web").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].status(), ReleaseStatus::Superseded);
    }

    #[tokio::test]
    async fn rollback_version_zero_picks_the_previous_revision() {
        let (server, _storage, _cluster) = harness();
        install(&server, "web").await;
        server
            .update_release("web", chart_b(), Value::Null, UpgradeOptions::default())
            .await
            .unwrap();

        let release = server
            .rollback_release("web", RollbackOptions::default())
            .await
            .unwrap();
        assert_eq!(release.version, 3);
        assert_eq!(release.chart.metadata.version, "1.0.0");
    }

    #[tokio::test]
    async fn rollback_to_the_live_version_is_rejected() {
        let (server, storage, _cluster) = harness();
        install(&server, "web").await;
        server
            .update_release("web", chart_b(), Value::Null, UpgradeOptions::default())
            .await
            .unwrap();

        let err = server
            .rollback_release(
                "web",
                RollbackOptions {
                    version: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::RollbackToLive { version: 2, .. }));
        assert_eq!(storage.history("web").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rollback_needs_a_previous_revision() {
        let (server, _storage, _cluster) = harness();
        install(&server, "web").await;

        let err = server
            .rollback_release("web", RollbackOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NoPreviousRevision(_)));
    }

    #[tokio::test]
    async fn uninstall_keeps_history_and_reserves_the_name() {
        let (server, storage, _cluster) = harness();
        install(&server, "web").await;

        let response = server
            .uninstall_release("web", UninstallOptions::default())
            .await
            .unwrap();
        assert_eq!(response.release.status(), ReleaseStatus::Uninstalled);
        assert!(response.release.info.deleted.is_some());
        assert_eq!(response.message, "2 resources deleted");

        // The name stays reserved until reuse is requested explicitly.
        let err = server
            .install_release(
                chart_a(),
                Value::Null,
                InstallOptions {
                    name: "web".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::AlreadyExists(_)));

        let reinstalled = server
            .install_release(
                chart_a(),
                Value::Null,
                InstallOptions {
                    name: "web".into(),
                    reuse_name: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(reinstalled.version, 2);
        assert_eq!(reinstalled.status(), ReleaseStatus::Deployed);
        assert_eq!(storage.history("web").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn purge_frees_the_name_and_resets_versions() {
        let (server, storage, _cluster) = harness();
        install(&server, "web").await;
        server
            .update_release("web", chart_b(), Value::Null, UpgradeOptions::default())
            .await
            .unwrap();

        server
            .uninstall_release(
                "web",
                UninstallOptions {
                    purge: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            storage.latest("web").await,
            Err(StoreError::ReleaseNotFound(_))
        ));

        let reinstalled = install(&server, "web").await;
        assert_eq!(reinstalled.version, FIRST_VERSION);
    }

    #[tokio::test]
    async fn concurrent_mutations_of_one_name_admit_exactly_one() {
        let (server, storage, cluster) = harness();
        install(&server, "web").await;
        cluster.set_latency(Duration::from_millis(50));

        let (first, second) = tokio::join!(
            server.update_release("web", chart_b(), Value::Null, UpgradeOptions::default()),
            server.update_release("web", chart_b(), Value::Null, UpgradeOptions::default()),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(ServerError::Busy { .. }))));
        assert_eq!(storage.history("web").await.unwrap().len(), 2);
        assert!(!server.coordinator.is_held("web"));
    }

    #[tokio::test]
    async fn budget_expiry_records_the_revision_as_failed() {
        let (server, storage, cluster) = harness();
        cluster.set_latency(Duration::from_millis(200));

        let err = server
            .install_release(
                chart_a(),
                Value::Null,
                InstallOptions {
                    name: "web".into(),
                    timeout: Duration::from_millis(50),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Timeout(_)));

        let failed = storage.latest("web").await.unwrap();
        assert_eq!(failed.status(), ReleaseStatus::Failed);
        assert!(failed.info.description.contains("timed out"));

        // The lease went with the failure, so the caller can retry.
        assert!(!server.coordinator.is_held("web"));
    }

    #[tokio::test]
    async fn failing_pre_hook_aborts_before_the_apply() {
        let (server, storage, cluster) = harness();
        cluster.fail_run("init-db");
        let chart = chart_a().with_hook(Hook::new("init-db", "Job", HookEvent::PreInstall));

        let err = server
            .install_release(
                chart,
                Value::Null,
                InstallOptions {
                    name: "web".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Hook(_)));
        assert_eq!(
            storage.latest("web").await.unwrap().status(),
            ReleaseStatus::Failed
        );

        let ops = cluster.operations();
        assert!(ops.contains(&ClusterOp::run("default", "Job", "init-db")));
        assert!(!ops.contains(&ClusterOp::create("default", "Service", "web-svc")));
    }

    #[tokio::test]
    async fn disable_hooks_skips_the_hook_phases() {
        let (server, _storage, cluster) = harness();
        cluster.fail_run("init-db");
        let chart = chart_a().with_hook(Hook::new("init-db", "Job", HookEvent::PreInstall));

        let release = server
            .install_release(
                chart,
                Value::Null,
                InstallOptions {
                    name: "web".into(),
                    disable_hooks: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(release.status(), ReleaseStatus::Deployed);
        assert!(!cluster
            .operations()
            .iter()
            .any(|op| matches!(op, ClusterOp::Run { .. })));
    }

    #[tokio::test]
    async fn release_test_streams_results_and_records_tested() {
        let (server, storage, _cluster) = harness();
        let chart = chart_a().with_hook(Hook::new("smoke", "Pod", HookEvent::Test));
        server
            .install_release(
                chart,
                Value::Null,
                InstallOptions {
                    name: "web".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut events = server.subscribe();
        let rx = server
            .run_release_test("web", TestOptions::default())
            .await
            .unwrap();
        let stream = drain(rx).await;

        assert_eq!(stream.last().unwrap().message, "1 of 1 tests passed");
        assert_eq!(stream.last().unwrap().status, TestStatus::Passed);
        assert_eq!(
            events.recv().await.unwrap(),
            ReleaseEvent::TestCompleted {
                name: "web".into(),
                passed: true,
            }
        );
        assert_eq!(
            storage.latest("web").await.unwrap().status(),
            ReleaseStatus::Tested
        );
        assert!(!server.coordinator.is_held("web"));
    }

    #[tokio::test]
    async fn failed_release_test_records_failed() {
        let (server, storage, cluster) = harness();
        cluster.fail_run("smoke");
        let chart = chart_a().with_hook(Hook::new("smoke", "Pod", HookEvent::Test));
        server
            .install_release(
                chart,
                Value::Null,
                InstallOptions {
                    name: "web".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let rx = server
            .run_release_test("web", TestOptions::default())
            .await
            .unwrap();
        let stream = drain(rx).await;

        assert_eq!(stream.last().unwrap().status, TestStatus::Failed);
        assert_eq!(
            storage.latest("web").await.unwrap().status(),
            ReleaseStatus::Failed
        );
    }

    /// Storage whose next `latest` read suspends once, to widen the window
    /// between admission and the read.
    struct StallingStorage {
        inner: InMemoryReleaseStorage,
        stall: std::sync::Mutex<Option<Duration>>,
    }

    impl StallingStorage {
        fn new() -> Self {
            Self {
                inner: InMemoryReleaseStorage::new(),
                stall: std::sync::Mutex::new(None),
            }
        }

        fn stall_next_latest(&self, delay: Duration) {
            *self.stall.lock().unwrap() = Some(delay);
        }
    }

    #[async_trait::async_trait]
    impl ReleaseStorage for StallingStorage {
        async fn get(&self, name: &str, version: u32) -> moor_store::Result<Release> {
            self.inner.get(name, version).await
        }

        async fn latest(&self, name: &str) -> moor_store::Result<Release> {
            let stall = self.stall.lock().unwrap().take();
            if let Some(delay) = stall {
                tokio::time::sleep(delay).await;
            }
            self.inner.latest(name).await
        }

        async fn create(&self, release: Release) -> moor_store::Result<()> {
            self.inner.create(release).await
        }

        async fn update(&self, release: Release) -> moor_store::Result<()> {
            self.inner.update(release).await
        }

        async fn history(&self, name: &str) -> moor_store::Result<Vec<Release>> {
            self.inner.history(name).await
        }

        async fn list(&self) -> moor_store::Result<Vec<Release>> {
            self.inner.list().await
        }

        async fn purge(&self, name: &str) -> moor_store::Result<Vec<Release>> {
            self.inner.purge(name).await
        }
    }

    #[tokio::test]
    async fn release_test_admission_blocks_concurrent_mutations() {
        let storage = Arc::new(StallingStorage::new());
        let cluster = Arc::new(MockClusterClient::new());
        let server = ReleaseServer::new(storage.clone(), cluster);
        install(&server, "web").await;
        let mut events = server.subscribe();

        // The test run holds the lease across its suspended storage read, so
        // an upgrade landing inside that window is turned away.
        storage.stall_next_latest(Duration::from_millis(150));
        let (test_rx, upgrade) = tokio::join!(
            server.run_release_test("web", TestOptions::default()),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                server
                    .update_release("web", chart_b(), Value::Null, UpgradeOptions::default())
                    .await
            },
        );

        assert!(matches!(upgrade, Err(ServerError::Busy { .. })));
        drain(test_rx.unwrap()).await;
        assert_eq!(
            events.recv().await.unwrap(),
            ReleaseEvent::TestCompleted {
                name: "web".into(),
                passed: true,
            }
        );

        let history = storage.history("web").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status(), ReleaseStatus::Tested);
        assert_eq!(
            history.iter().filter(|r| r.status().is_live()).count(),
            1
        );
    }

    #[tokio::test]
    async fn testing_an_uninstalled_release_keeps_its_status() {
        let (server, storage, _cluster) = harness();
        let chart = chart_a().with_hook(Hook::new("smoke", "Pod", HookEvent::Test));
        server
            .install_release(
                chart,
                Value::Null,
                InstallOptions {
                    name: "web".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        server
            .uninstall_release("web", UninstallOptions::default())
            .await
            .unwrap();

        let rx = server
            .run_release_test("web", TestOptions::default())
            .await
            .unwrap();
        drain(rx).await;

        assert_eq!(
            storage.latest("web").await.unwrap().status(),
            ReleaseStatus::Uninstalled
        );
    }

    #[tokio::test]
    async fn status_content_and_history_reads() {
        let (server, _storage, _cluster) = harness();
        install(&server, "web").await;
        server
            .update_release("web", chart_b(), Value::Null, UpgradeOptions::default())
            .await
            .unwrap();

        let status = server.get_release_status("web", 0).await.unwrap();
        assert_eq!(status.version, 2);
        assert_eq!(status.info.status, ReleaseStatus::Deployed);

        let content = server.get_release_content("web", 1).await.unwrap();
        assert_eq!(content.chart.metadata.version, "1.0.0");

        let history = server.get_history("web", 1).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].version, 2);

        assert!(!server.get_version().is_empty());
    }

    #[tokio::test]
    async fn reads_on_unknown_names_fail_with_not_found() {
        let (server, _storage, _cluster) = harness();
        let err = server.get_release_status("ghost", 0).await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Store(StoreError::ReleaseNotFound(_))
        ));
    }

    #[tokio::test]
    async fn stream_releases_walks_every_page() {
        let (server, _storage, _cluster) = harness();
        for name in ["api", "cache", "web"] {
            install(&server, name).await;
        }

        let mut rx = server.stream_releases(ListQuery {
            limit: 2,
            ..Default::default()
        });
        let mut names = Vec::new();
        while let Some(page) = rx.recv().await {
            let page = page.unwrap();
            names.extend(page.releases.iter().map(|r| r.name.clone()));
        }
        assert_eq!(names, vec!["api", "cache", "web"]);
    }

    #[tokio::test]
    async fn install_broadcasts_an_event() {
        let (server, _storage, _cluster) = harness();
        let mut events = server.subscribe();

        install(&server, "web").await;
        assert_eq!(
            events.recv().await.unwrap(),
            ReleaseEvent::Installed {
                name: "web".into(),
                version: 1,
            }
        );
    }

    #[tokio::test]
    async fn dry_run_upgrade_previews_the_next_revision() {
        let (server, storage, cluster) = harness();
        install(&server, "web").await;
        let mutations = cluster.mutation_count();

        let preview = server
            .update_release(
                "web",
                chart_b(),
                Value::Null,
                UpgradeOptions {
                    dry_run: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(preview.version, 2);
        assert_eq!(preview.status(), ReleaseStatus::PendingUpgrade);
        assert_eq!(storage.revision_count(), 1);
        assert_eq!(cluster.mutation_count(), mutations);
    }

    #[tokio::test]
    async fn full_lifecycle_scenario() {
        let (server, storage, _cluster) = harness();

        // Install chart A.
        let v1 = install(&server, "web").await;
        assert_eq!(v1.version, 1);
        assert_eq!(v1.status(), ReleaseStatus::Deployed);

        // Upgrade to chart B.
        let v2 = server
            .update_release("web", chart_b(), Value::Null, UpgradeOptions::default())
            .await
            .unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(
            storage.get("web", 1).await.unwrap().status(),
            ReleaseStatus::Superseded
        );

        // Roll back to revision 1; its content comes back under version 3.
        let v3 = server
            .rollback_release(
                "web",
                RollbackOptions {
                    version: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(v3.version, 3);
        assert_eq!(v3.status(), ReleaseStatus::Deployed);
        assert_eq!(v3.chart, chart_a());
        assert_eq!(
            storage.get("web", 2).await.unwrap().status(),
            ReleaseStatus::Superseded
        );

        // Uninstall without purge keeps the name reserved.
        server
            .uninstall_release("web", UninstallOptions::default())
            .await
            .unwrap();
        assert_eq!(
            storage.latest("web").await.unwrap().status(),
            ReleaseStatus::Uninstalled
        );
        let err = server
            .install_release(
                chart_a(),
                Value::Null,
                InstallOptions {
                    name: "web".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::AlreadyExists(_)));

        // Versions stayed gap-free throughout.
        let versions: Vec<u32> = storage
            .history("web")
            .await
            .unwrap()
            .iter()
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec![3, 2, 1]);
    }

    #[test]
    fn reset_values_discards_the_previous_config() {
        let previous = json!({"a": 1, "b": 2});
        let resolved = resolve_values(&previous, json!({"b": 3}), true, false);
        assert_eq!(resolved, json!({"b": 3}));
    }

    #[test]
    fn reuse_values_deep_merges_over_the_previous_config() {
        let previous = json!({"a": 1, "nested": {"x": 1, "y": 2}});
        let resolved = resolve_values(&previous, json!({"nested": {"y": 9}}), false, true);
        assert_eq!(resolved, json!({"a": 1, "nested": {"x": 1, "y": 9}}));
    }

    #[test]
    fn empty_incoming_values_keep_the_previous_config() {
        let previous = json!({"a": 1});
        assert_eq!(
            resolve_values(&previous, Value::Null, false, false),
            previous
        );
        assert_eq!(resolve_values(&previous, json!({}), false, false), previous);
        assert_eq!(
            resolve_values(&previous, json!({"a": 2}), false, false),
            json!({"a": 2})
        );
    }
}
