//! Recording mock of the cluster capability
//!
//! Ships in-crate so the server's tests can wire a programmable cluster the
//! same way production wires a real one. Failures, readiness outcomes and
//! artificial latency are all configurable after construction.

use crate::client::ClusterClient;
use crate::error::{ClusterError, Result};
use async_trait::async_trait;
use dashmap::DashSet;
use moor_types::{Resource, ResourceRef};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// One recorded cluster call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterOp {
    Create {
        namespace: String,
        kind: String,
        name: String,
    },
    Update {
        namespace: String,
        kind: String,
        name: String,
    },
    Delete {
        namespace: String,
        kind: String,
        name: String,
    },
    WaitReady {
        namespace: String,
        resources: usize,
    },
    Run {
        namespace: String,
        kind: String,
        name: String,
    },
}

impl ClusterOp {
    pub fn create(namespace: &str, kind: &str, name: &str) -> Self {
        ClusterOp::Create {
            namespace: namespace.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn update(namespace: &str, kind: &str, name: &str) -> Self {
        ClusterOp::Update {
            namespace: namespace.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn delete(namespace: &str, kind: &str, name: &str) -> Self {
        ClusterOp::Delete {
            namespace: namespace.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn run(namespace: &str, kind: &str, name: &str) -> Self {
        ClusterOp::Run {
            namespace: namespace.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Programmable in-memory cluster client
pub struct MockClusterClient {
    operations: Mutex<Vec<ClusterOp>>,
    fail_creates: DashSet<String>,
    fail_runs: DashSet<String>,
    missing: DashSet<ResourceRef>,
    never_ready: AtomicBool,
    latency: Mutex<Option<Duration>>,
    run_delay: Mutex<Option<Duration>>,
}

impl MockClusterClient {
    pub fn new() -> Self {
        Self {
            operations: Mutex::new(Vec::new()),
            fail_creates: DashSet::new(),
            fail_runs: DashSet::new(),
            missing: DashSet::new(),
            never_ready: AtomicBool::new(false),
            latency: Mutex::new(None),
            run_delay: Mutex::new(None),
        }
    }

    /// Every call made so far, in order.
    pub fn operations(&self) -> Vec<ClusterOp> {
        self.operations.lock().expect("mock lock").clone()
    }

    /// Number of calls that mutate cluster state.
    pub fn mutation_count(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| !matches!(op, ClusterOp::WaitReady { .. }))
            .count()
    }

    /// Make creates of the named resource fail.
    pub fn fail_create(&self, name: &str) {
        self.fail_creates.insert(name.to_string());
    }

    /// Make hook/test executions of the named resource fail.
    pub fn fail_run(&self, name: &str) {
        self.fail_runs.insert(name.to_string());
    }

    /// Report the resource as absent on delete.
    pub fn missing(&self, kind: &str, name: &str) {
        self.missing.insert(ResourceRef {
            kind: kind.into(),
            name: name.into(),
        });
    }

    /// Make readiness polling always exhaust its timeout.
    pub fn never_ready(&self) {
        self.never_ready.store(true, Ordering::SeqCst);
    }

    /// Delay every create/update call, to hold operations in flight.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().expect("mock lock") = Some(latency);
    }

    /// Delay hook/test executions by this much before completing.
    pub fn set_run_delay(&self, delay: Duration) {
        *self.run_delay.lock().expect("mock lock") = Some(delay);
    }

    fn record(&self, op: ClusterOp) {
        self.operations.lock().expect("mock lock").push(op);
    }

    async fn apply_latency(&self) {
        let latency = *self.latency.lock().expect("mock lock");
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MockClusterClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClusterClient for MockClusterClient {
    async fn create(&self, namespace: &str, resource: &Resource) -> Result<()> {
        self.apply_latency().await;
        self.record(ClusterOp::create(namespace, &resource.kind, &resource.name));
        if self.fail_creates.contains(&resource.name) {
            return Err(ClusterError::ApplyFailed {
                reference: resource.reference(),
                reason: "simulated create failure".into(),
            });
        }
        Ok(())
    }

    async fn update(&self, namespace: &str, resource: &Resource) -> Result<()> {
        self.apply_latency().await;
        self.record(ClusterOp::update(namespace, &resource.kind, &resource.name));
        Ok(())
    }

    async fn delete(&self, namespace: &str, reference: &ResourceRef) -> Result<()> {
        self.record(ClusterOp::delete(namespace, &reference.kind, &reference.name));
        if self.missing.contains(reference) {
            return Err(ClusterError::ResourceNotFound(reference.clone()));
        }
        Ok(())
    }

    async fn wait_ready(
        &self,
        namespace: &str,
        references: &[ResourceRef],
        timeout: Duration,
    ) -> Result<()> {
        self.record(ClusterOp::WaitReady {
            namespace: namespace.into(),
            resources: references.len(),
        });
        if self.never_ready.load(Ordering::SeqCst) {
            tokio::time::sleep(timeout).await;
            return Err(ClusterError::NotReady {
                elapsed: timeout,
                pending: references.len(),
            });
        }
        Ok(())
    }

    async fn run_to_completion(
        &self,
        namespace: &str,
        resource: &Resource,
        budget: Duration,
    ) -> Result<()> {
        self.record(ClusterOp::run(namespace, &resource.kind, &resource.name));
        let delay = *self.run_delay.lock().expect("mock lock");
        if let Some(delay) = delay {
            if delay > budget {
                tokio::time::sleep(budget).await;
                return Err(ClusterError::ExecutionTimedOut {
                    reference: resource.reference(),
                    budget,
                });
            }
            tokio::time::sleep(delay).await;
        }
        if self.fail_runs.contains(&resource.name) {
            return Err(ClusterError::ExecutionFailed {
                reference: resource.reference(),
                reason: "simulated execution failure".into(),
            });
        }
        Ok(())
    }
}
