//! Moor Hooks - Lifecycle hook execution and release tests
//!
//! Hooks bracket the cluster apply step: pre-phase hooks run before the
//! delta lands, post-phase hooks after. Within a phase, order is ascending
//! weight, stable on declaration order. Each hook gets the remainder of the
//! operation's timeout budget; the first failure aborts the phase.
//!
//! ## Key Components
//!
//! - [`HookExecutor`]: runs one phase of hooks with delete-policy handling
//! - [`TestRunner`]: runs `test` hooks serially or in parallel, streaming
//!   results over a channel as they complete

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod executor;
pub mod testrun;

// Re-exports
pub use error::{HookError, Result};
pub use executor::HookExecutor;
pub use testrun::{TestEvent, TestOptions, TestRunner, TestStatus};
