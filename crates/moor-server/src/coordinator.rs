//! Per-release operation coordinator
//!
//! Serializes mutating operations so at most one is in flight per release
//! name. Acquisition is non-blocking: contention fails immediately with
//! `Busy` rather than queuing the caller. Different names never contend.

use crate::error::{Result, ServerError};
use dashmap::DashMap;
use moor_types::Operation;
use std::sync::Arc;
use tracing::debug;

/// Grants exclusive per-name leases for mutating operations
#[derive(Clone, Default)]
pub struct OperationCoordinator {
    leases: Arc<DashMap<String, Operation>>,
}

impl OperationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease for a release name, or fail with `Busy`.
    ///
    /// The returned guard releases the lease when dropped, on every exit
    /// path including panics.
    pub fn acquire(&self, name: &str, operation: Operation) -> Result<OperationLease> {
        match self.leases.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(held) => Err(ServerError::Busy {
                name: name.to_string(),
                operation: *held.get(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(operation);
                debug!(release = name, operation = %operation, "Lease acquired");
                Ok(OperationLease {
                    name: name.to_string(),
                    leases: self.leases.clone(),
                })
            }
        }
    }

    /// True while a mutating operation holds the name.
    pub fn is_held(&self, name: &str) -> bool {
        self.leases.contains_key(name)
    }
}

/// Exclusive right to mutate one release name
#[derive(Debug)]
pub struct OperationLease {
    name: String,
    leases: Arc<DashMap<String, Operation>>,
}

impl Drop for OperationLease {
    fn drop(&mut self) {
        self.leases.remove(&self.name);
        debug!(release = %self.name, "Lease released");
    }
}
