//! Lifecycle event stream
//!
//! The server broadcasts one event per completed operation so monitors can
//! observe the release fleet without polling the store.

use moor_types::Operation;
use serde::{Deserialize, Serialize};

/// A completed (or failed) lifecycle operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReleaseEvent {
    /// A release was installed
    Installed { name: String, version: u32 },

    /// A release was upgraded to a new revision
    Upgraded { name: String, version: u32 },

    /// A release was rolled back to the content of an older revision
    RolledBack {
        name: String,
        version: u32,
        target: u32,
    },

    /// A release was uninstalled
    Uninstalled { name: String, purged: bool },

    /// A release test run finished
    TestCompleted { name: String, passed: bool },

    /// A mutating operation failed
    OperationFailed {
        name: String,
        operation: Operation,
        reason: String,
    },
}
