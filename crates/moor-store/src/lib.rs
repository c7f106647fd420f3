//! Moor Store - Release revision storage and queries
//!
//! Durable keyed storage for release revisions plus the history & query
//! service used by list endpoints.
//!
//! ## Key Components
//!
//! - [`ReleaseStorage`]: async storage contract, linearizable per name
//! - [`InMemoryReleaseStorage`]: concurrent-map backend for single-process
//!   deployments and tests
//! - [`ListQuery`]/[`list_latest`]: filtering, sorting and key-offset
//!   pagination over the latest revision of each name
//!
//! The storage contract enforces the monotonic version invariant: `create`
//! rejects any name+version pair that already exists, so revision numbers
//! for a name are exactly `{1..N}` under any sequence of operations.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod memory;
pub mod query;
pub mod storage;

// Re-exports
pub use error::{Result, StoreError};
pub use memory::InMemoryReleaseStorage;
pub use query::{list_latest, ListPage, ListQuery, SortBy, SortOrder};
pub use storage::ReleaseStorage;
