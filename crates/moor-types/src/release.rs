//! Release and revision types
//!
//! A release name maps to an append-only sequence of revisions. Version
//! numbers per name are gap-free and strictly increasing, starting at 1.
//! Once superseded, a revision is immutable apart from its status field.

use crate::chart::Chart;
use crate::hook::Hook;
use crate::status::ReleaseStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// First version number assigned to a release name.
pub const FIRST_VERSION: u32 = 1;

/// One revision of a named deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Release name, stable across revisions
    pub name: String,

    /// Namespace the release lives in
    pub namespace: String,

    /// Revision number, monotonically increasing per name
    pub version: u32,

    /// Rendered chart bundle this revision deploys
    pub chart: Chart,

    /// Configuration values the chart was rendered with (opaque blob)
    pub config: serde_json::Value,

    /// Status, timestamps and notes
    pub info: ReleaseInfo,

    /// Hooks attached to this revision, in declaration order
    pub hooks: Vec<Hook>,
}

impl Release {
    /// Create the pending revision for a new operation.
    ///
    /// Hooks are copied out of the chart so the revision carries the exact
    /// hook set it was deployed with.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        version: u32,
        chart: Chart,
        config: serde_json::Value,
        status: ReleaseStatus,
    ) -> Self {
        let now = Utc::now();
        let hooks = chart.hooks.clone();
        Self {
            name: name.into(),
            namespace: namespace.into(),
            version,
            chart,
            config,
            info: ReleaseInfo {
                status,
                description: String::new(),
                first_deployed: now,
                last_deployed: now,
                deleted: None,
                notes: String::new(),
            },
            hooks,
        }
    }

    /// Current status of this revision.
    pub fn status(&self) -> ReleaseStatus {
        self.info.status
    }

    /// Transition the status field, bumping the last-deployed timestamp for
    /// terminal deployment outcomes.
    pub fn set_status(&mut self, status: ReleaseStatus) {
        if status == ReleaseStatus::Deployed {
            self.info.last_deployed = Utc::now();
        }
        self.info.status = status;
    }

    /// Key identifying this revision in logs and errors.
    pub fn key(&self) -> String {
        format!("{}.v{}", self.name, self.version)
    }
}

/// Status and bookkeeping for one revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Revision status
    pub status: ReleaseStatus,

    /// Human-readable description of the operation that made this revision
    pub description: String,

    /// When the first revision of this name was deployed
    pub first_deployed: DateTime<Utc>,

    /// When this revision was last deployed
    pub last_deployed: DateTime<Utc>,

    /// When the release was uninstalled, if it was
    pub deleted: Option<DateTime<Utc>>,

    /// Free-text notes surfaced to the caller
    pub notes: String,
}
