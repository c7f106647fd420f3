//! Release test runner
//!
//! Runs the `test` hooks of a release and streams results over a bounded
//! channel. Serial runs stream in declared order; parallel runs stream in
//! completion order. The stream always ends with a summary event whose
//! status is the conjunction of all individual results.

use crate::executor::HookExecutor;
use futures::stream::{FuturesUnordered, StreamExt};
use moor_cluster::ClusterClient;
use moor_types::{Hook, HookEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// Status attached to a streamed test event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestStatus {
    /// The test has been dispatched
    Running,
    /// The test completed successfully
    Passed,
    /// The test completed unsuccessfully
    Failed,
}

/// One streamed test result message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEvent {
    pub message: String,
    pub status: TestStatus,
}

/// Options for one test run
#[derive(Debug, Clone)]
pub struct TestOptions {
    /// Per-test execution budget
    pub timeout: Duration,

    /// Delete each test's resource after its result is reported
    pub cleanup: bool,

    /// Dispatch all tests concurrently, streaming results by completion
    pub parallel: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            cleanup: false,
            parallel: false,
        }
    }
}

/// Runs release test hooks and streams their results
#[derive(Clone)]
pub struct TestRunner {
    client: Arc<dyn ClusterClient>,
}

impl TestRunner {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// Run every test hook, streaming events into `tx`.
    ///
    /// Returns the overall verdict: true only if every test passed (an
    /// empty test set passes vacuously). Send errors are ignored so a
    /// consumer dropping the receiver terminates the stream early without
    /// failing the run.
    pub async fn execute(
        &self,
        tx: mpsc::Sender<TestEvent>,
        namespace: &str,
        hooks: &[Hook],
        options: &TestOptions,
    ) -> bool {
        let tests = HookExecutor::plan(hooks, HookEvent::Test);
        let total = tests.len();
        info!(namespace = namespace, tests = total, "Running release tests");

        let mut passed = 0usize;
        if options.parallel {
            let mut pending: FuturesUnordered<_> = tests
                .iter()
                .map(|test| self.run_one(tx.clone(), namespace, test, options))
                .collect();
            while let Some(ok) = pending.next().await {
                if ok {
                    passed += 1;
                }
            }
        } else {
            for test in &tests {
                if self.run_one(tx.clone(), namespace, test, options).await {
                    passed += 1;
                }
            }
        }

        let all_passed = passed == total;
        let summary = TestEvent {
            message: format!("{passed} of {total} tests passed"),
            status: if all_passed {
                TestStatus::Passed
            } else {
                TestStatus::Failed
            },
        };
        let _ = tx.send(summary).await;
        all_passed
    }

    /// Convenience wrapper that spawns the run and hands back the receiver.
    pub fn run(
        &self,
        namespace: String,
        hooks: Vec<Hook>,
        options: TestOptions,
    ) -> mpsc::Receiver<TestEvent> {
        let (tx, rx) = mpsc::channel(32);
        let runner = self.clone();
        tokio::spawn(async move {
            runner.execute(tx, &namespace, &hooks, &options).await;
        });
        rx
    }

    async fn run_one(
        &self,
        tx: mpsc::Sender<TestEvent>,
        namespace: &str,
        test: &Hook,
        options: &TestOptions,
    ) -> bool {
        let _ = tx
            .send(TestEvent {
                message: format!("running test {}", test.name),
                status: TestStatus::Running,
            })
            .await;

        let result = self
            .client
            .run_to_completion(namespace, &test.resource(), options.timeout)
            .await;

        let event = match &result {
            Ok(()) => TestEvent {
                message: format!("test {} passed", test.name),
                status: TestStatus::Passed,
            },
            Err(e) => TestEvent {
                message: format!("test {} failed: {e}", test.name),
                status: TestStatus::Failed,
            },
        };
        let _ = tx.send(event).await;

        // Ephemeral test resources go away regardless of the verdict.
        if options.cleanup {
            let _ = self.client.delete(namespace, &test.reference()).await;
        }

        result.is_ok()
    }
}
