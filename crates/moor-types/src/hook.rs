//! Lifecycle hook descriptors
//!
//! Hooks are side-effecting units of work executed at defined lifecycle
//! phases, outside the main resource set. Within a phase they run in
//! ascending weight order, stable on declaration order for ties.

use crate::chart::{Resource, ResourceRef};
use serde::{Deserialize, Serialize};

/// A lifecycle hook declared by a chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    /// Hook name
    pub name: String,

    /// Kind of the resource the hook creates
    pub kind: String,

    /// Rendered manifest for the hook resource
    pub manifest: String,

    /// Lifecycle events this hook fires on
    pub events: Vec<HookEvent>,

    /// Execution order within a phase; lower weights run first
    pub weight: i32,

    /// What happens to the hook's resource around execution
    pub delete_policy: HookDeletePolicy,
}

impl Hook {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, event: HookEvent) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            manifest: String::new(),
            events: vec![event],
            weight: 0,
            delete_policy: HookDeletePolicy::Never,
        }
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_delete_policy(mut self, policy: HookDeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }

    /// True when this hook fires on the given event.
    pub fn fires_on(&self, event: HookEvent) -> bool {
        self.events.contains(&event)
    }

    /// The cluster resource this hook materializes as.
    pub fn resource(&self) -> Resource {
        Resource::new(&self.kind, &self.name, &self.manifest)
    }

    /// Identity reference for the hook's resource.
    pub fn reference(&self) -> ResourceRef {
        ResourceRef {
            kind: self.kind.clone(),
            name: self.name.clone(),
        }
    }
}

/// Lifecycle event a hook can fire on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookEvent {
    PreInstall,
    PostInstall,
    PreUpgrade,
    PostUpgrade,
    PreRollback,
    PostRollback,
    PreUninstall,
    PostUninstall,
    /// Release test hook, run by the test runner only
    Test,
}

/// Deletion policy for a hook's resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum HookDeletePolicy {
    /// Delete any previous incarnation before the hook runs
    BeforeCreate,
    /// Delete the resource after the hook completes successfully
    OnSucceeded,
    /// Leave the resource in place
    #[default]
    Never,
}
