//! Moor Server - Release lifecycle server facade
//!
//! The server sequences every lifecycle operation over a release store and
//! a cluster capability: installs, upgrades, rollbacks, uninstalls, release
//! tests and the read-only status/history/listing surface. Mutations of one
//! release name are serialized by a non-blocking lease; different names
//! proceed independently.
//!
//! ## Key Components
//!
//! - [`ReleaseServer`]: the RPC surface, one method per operation
//! - [`OperationCoordinator`]: per-name leases with RAII release
//! - [`ReleaseEvent`]: broadcast stream of completed operations
//!
//! ## Example
//!
//! ```no_run
//! use moor_cluster::MockClusterClient;
//! use moor_server::{InstallOptions, ReleaseServer};
//! use moor_store::InMemoryReleaseStorage;
//! use moor_types::Chart;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), moor_server::ServerError> {
//! let server = ReleaseServer::new(
//!     Arc::new(InMemoryReleaseStorage::new()),
//!     Arc::new(MockClusterClient::new()),
//! );
//! let release = server
//!     .install_release(
//!         Chart::new("web", "1.0.0"),
//!         serde_json::json!({}),
//!         InstallOptions {
//!             name: "web".into(),
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//! println!("installed {} v{}", release.name, release.version);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod coordinator;
pub mod error;
pub mod events;
pub mod options;
pub mod server;

// Re-exports
pub use coordinator::{OperationCoordinator, OperationLease};
pub use error::{Result, ServerError};
pub use events::ReleaseEvent;
pub use options::{InstallOptions, RollbackOptions, UninstallOptions, UpgradeOptions};
pub use server::{ReleaseServer, ReleaseStatusResponse, UninstallResponse};

// Query and test surface used by callers of the server
pub use moor_hooks::{TestEvent, TestOptions, TestStatus};
pub use moor_store::{ListPage, ListQuery, SortBy, SortOrder};
