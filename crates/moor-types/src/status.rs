//! Release status and the operation transition table
//!
//! Every lifecycle operation moves a release through a fixed set of statuses.
//! The legal moves live in [`next_pending`] as a single match so the whole
//! table is auditable and unit-testable in isolation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a release revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseStatus {
    /// Status cannot be determined (no history for the name)
    Unknown,
    /// Install in flight
    PendingInstall,
    /// Upgrade in flight
    PendingUpgrade,
    /// Rollback in flight
    PendingRollback,
    /// Live on the cluster
    Deployed,
    /// Replaced by a newer revision
    Superseded,
    /// The operation that produced this revision failed
    Failed,
    /// Uninstall in flight
    Uninstalling,
    /// Removed from the cluster; name stays reserved unless purged
    Uninstalled,
    /// Release test in flight
    PendingTest,
    /// Release tests completed successfully
    Tested,
}

impl ReleaseStatus {
    /// True for the transient statuses an in-flight operation holds.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ReleaseStatus::PendingInstall
                | ReleaseStatus::PendingUpgrade
                | ReleaseStatus::PendingRollback
                | ReleaseStatus::PendingTest
        )
    }

    /// True when this revision is the live one for its name.
    ///
    /// At most one revision per name may hold a live status at any instant.
    pub fn is_live(&self) -> bool {
        self.is_pending() || matches!(self, ReleaseStatus::Deployed | ReleaseStatus::Tested)
    }

    /// True for statuses that may be a rollback target.
    pub fn is_rollback_target(&self) -> bool {
        matches!(
            self,
            ReleaseStatus::Superseded | ReleaseStatus::Failed | ReleaseStatus::Uninstalled
        )
    }

    /// Wire-stable name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Unknown => "UNKNOWN",
            ReleaseStatus::PendingInstall => "PENDING_INSTALL",
            ReleaseStatus::PendingUpgrade => "PENDING_UPGRADE",
            ReleaseStatus::PendingRollback => "PENDING_ROLLBACK",
            ReleaseStatus::Deployed => "DEPLOYED",
            ReleaseStatus::Superseded => "SUPERSEDED",
            ReleaseStatus::Failed => "FAILED",
            ReleaseStatus::Uninstalling => "UNINSTALLING",
            ReleaseStatus::Uninstalled => "UNINSTALLED",
            ReleaseStatus::PendingTest => "PENDING_TEST",
            ReleaseStatus::Tested => "TESTED",
        }
    }
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutating release operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Install,
    Upgrade,
    Rollback,
    Uninstall,
    Test,
}

impl Operation {
    /// Status held while this operation is in flight.
    pub fn pending_status(&self) -> ReleaseStatus {
        match self {
            Operation::Install => ReleaseStatus::PendingInstall,
            Operation::Upgrade => ReleaseStatus::PendingUpgrade,
            Operation::Rollback => ReleaseStatus::PendingRollback,
            Operation::Uninstall => ReleaseStatus::Uninstalling,
            Operation::Test => ReleaseStatus::PendingTest,
        }
    }

    /// Terminal status recorded when this operation succeeds.
    pub fn success_status(&self) -> ReleaseStatus {
        match self {
            Operation::Install | Operation::Upgrade | Operation::Rollback => {
                ReleaseStatus::Deployed
            }
            Operation::Uninstall => ReleaseStatus::Uninstalled,
            Operation::Test => ReleaseStatus::Tested,
        }
    }

    /// Hook events bracketing the apply step for this operation.
    ///
    /// `None` for operations that have no pre/post phases (tests run their
    /// own hook event).
    pub fn hook_events(&self) -> Option<(crate::HookEvent, crate::HookEvent)> {
        use crate::HookEvent;
        match self {
            Operation::Install => Some((HookEvent::PreInstall, HookEvent::PostInstall)),
            Operation::Upgrade => Some((HookEvent::PreUpgrade, HookEvent::PostUpgrade)),
            Operation::Rollback => Some((HookEvent::PreRollback, HookEvent::PostRollback)),
            Operation::Uninstall => Some((HookEvent::PreUninstall, HookEvent::PostUninstall)),
            Operation::Test => None,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Install => "install",
            Operation::Upgrade => "upgrade",
            Operation::Rollback => "rollback",
            Operation::Uninstall => "uninstall",
            Operation::Test => "test",
        };
        f.write_str(name)
    }
}

/// Rejected status transition
#[derive(Debug, Clone, Error)]
#[error("cannot {operation} a release in status {current}")]
pub struct TransitionError {
    /// Operation that was attempted
    pub operation: Operation,
    /// Status of the latest revision at the time
    pub current: ReleaseStatus,
}

/// Compute the pending status an operation moves a release into.
///
/// `current` is the status of the latest revision for the name, or
/// [`ReleaseStatus::Unknown`] when the name has no history. A `Failed` or
/// `Tested` latest revision stays operable: after a failed operation no
/// revision is live and the name must not wedge.
pub fn next_pending(
    current: ReleaseStatus,
    operation: Operation,
) -> Result<ReleaseStatus, TransitionError> {
    use Operation::*;
    use ReleaseStatus::*;

    let legal = match (operation, current) {
        (Install, Unknown) => true,
        // Name reuse after a full uninstall; the reuse flag is enforced by
        // the server before it consults the table.
        (Install, Uninstalled) => true,
        (Upgrade, Deployed | Failed | Tested) => true,
        (Rollback, Deployed | Failed | Tested) => true,
        (Uninstall, Deployed | Failed | Tested) => true,
        (Test, Deployed | Uninstalled | Tested) => true,
        _ => false,
    };

    if legal {
        Ok(operation.pending_status())
    } else {
        Err(TransitionError { operation, current })
    }
}
