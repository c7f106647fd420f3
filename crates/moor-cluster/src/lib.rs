//! Moor Cluster - Apply/diff engine over an abstract cluster capability
//!
//! The core never talks to a cluster directly. Everything side-effecting
//! goes through the [`ClusterClient`] trait: creating, updating and
//! deleting resources, polling readiness, and running hook resources to
//! completion. Reconciliation internals belong to the implementation.
//!
//! ## Key Components
//!
//! - [`ClusterClient`]: the capability trait the core calls
//! - [`DiffPlan`]/[`diff`]: the create/update/delete delta between two
//!   revisions' resource sets
//! - [`ApplyEngine`]: ordered apply with wait-for-ready polling and
//!   cleanup-on-fail for partially applied operations
//! - [`MockClusterClient`]: recording, programmable client for tests

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod apply;
pub mod client;
pub mod diff;
pub mod error;
pub mod mock;

// Re-exports
pub use apply::{ApplyEngine, ApplyOptions};
pub use client::ClusterClient;
pub use diff::{diff, DiffPlan};
pub use error::{ApplyError, ClusterError, Result};
pub use mock::{ClusterOp, MockClusterClient};
