//! Moor Types - Core types for chart release lifecycle management
//!
//! A *release* is a named, versioned instance of a chart (a rendered manifest
//! bundle) applied to a cluster. Each mutation of a release appends a new
//! *revision* with a monotonically increasing version number; older revisions
//! stay in history with a terminal status.
//!
//! ## Architectural Boundaries
//!
//! - **moor-types** owns: the release data model and the status transition table
//! - **moor-store** owns: durable revision storage and queries
//! - **moor-cluster** owns: applying manifest deltas to the cluster
//! - **moor-server** owns: operation sequencing and the RPC surface
//!
//! ## Key Concepts
//!
//! - **Release**: one revision of a named deployment
//! - **ReleaseStatus**: closed status enum with a table-driven transition function
//! - **Chart**: opaque rendered manifest bundle consumed by the core
//! - **Hook**: side-effecting unit of work bracketing the apply step

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod chart;
pub mod hook;
pub mod release;
pub mod status;

// Re-export main types
pub use chart::{Chart, ChartMetadata, Resource, ResourceRef};
pub use hook::{Hook, HookDeletePolicy, HookEvent};
pub use release::{Release, ReleaseInfo, FIRST_VERSION};
pub use status::{next_pending, Operation, ReleaseStatus, TransitionError};
