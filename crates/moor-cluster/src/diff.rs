//! Manifest set diffing
//!
//! Computes the delta that moves the cluster from one revision's resource
//! set to the next. Identity is `(kind, name)`; manifest bodies are opaque.

use moor_types::{Resource, ResourceRef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The create/update/delete delta between two resource sets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffPlan {
    /// Resources present only in the new set, in declaration order
    pub creates: Vec<Resource>,

    /// Resources present in both sets, applied with the new manifest
    pub updates: Vec<Resource>,

    /// Resources present only in the old set
    pub deletes: Vec<ResourceRef>,
}

impl DiffPlan {
    /// True when the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Total number of resources the plan touches.
    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    /// References of every resource the new set expects on the cluster.
    pub fn expected(&self) -> Vec<ResourceRef> {
        self.creates
            .iter()
            .chain(self.updates.iter())
            .map(Resource::reference)
            .collect()
    }

    /// One-line summary for logs and dry-run descriptions.
    pub fn summary(&self) -> String {
        format!(
            "{} to create, {} to update, {} to delete",
            self.creates.len(),
            self.updates.len(),
            self.deletes.len()
        )
    }
}

/// Compute the delta from `old` to `new`.
///
/// Resources present in both sets land in `updates` regardless of manifest
/// equality; forcing an update on an unchanged resource is how restart
/// semantics (`recreate`) reach resources whose manifests did not move.
pub fn diff(old: &[Resource], new: &[Resource]) -> DiffPlan {
    let old_refs: HashSet<ResourceRef> = old.iter().map(Resource::reference).collect();
    let new_refs: HashSet<ResourceRef> = new.iter().map(Resource::reference).collect();

    let mut plan = DiffPlan::default();
    for resource in new {
        if old_refs.contains(&resource.reference()) {
            plan.updates.push(resource.clone());
        } else {
            plan.creates.push(resource.clone());
        }
    }
    for resource in old {
        if !new_refs.contains(&resource.reference()) {
            plan.deletes.push(resource.reference());
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(kind: &str, name: &str) -> Resource {
        Resource::new(kind, name, format!("kind: {kind}\nname: {name}"))
    }

    #[test]
    fn install_creates_everything() {
        let new = vec![res("Service", "web"), res("Deployment", "web")];
        let plan = diff(&[], &new);
        assert_eq!(plan.creates.len(), 2);
        assert!(plan.updates.is_empty());
        assert!(plan.deletes.is_empty());
    }

    #[test]
    fn overlap_becomes_update() {
        let old = vec![res("Service", "web"), res("ConfigMap", "web-env")];
        let new = vec![res("Service", "web"), res("Deployment", "web")];
        let plan = diff(&old, &new);

        assert_eq!(plan.creates.len(), 1);
        assert_eq!(plan.creates[0].kind, "Deployment");
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].kind, "Service");
        assert_eq!(plan.deletes.len(), 1);
        assert_eq!(plan.deletes[0].kind, "ConfigMap");
    }

    #[test]
    fn same_name_different_kind_are_distinct() {
        let old = vec![res("Service", "web")];
        let new = vec![res("Deployment", "web")];
        let plan = diff(&old, &new);
        assert_eq!(plan.creates.len(), 1);
        assert_eq!(plan.deletes.len(), 1);
        assert!(plan.updates.is_empty());
    }

    #[test]
    fn uninstall_deletes_everything() {
        let old = vec![res("Service", "web"), res("Deployment", "web")];
        let plan = diff(&old, &[]);
        assert!(plan.creates.is_empty());
        assert!(plan.updates.is_empty());
        assert_eq!(plan.deletes.len(), 2);
        assert!(plan.expected().is_empty());
    }

    #[test]
    fn empty_sets_yield_empty_plan() {
        let plan = diff(&[], &[]);
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }
}
