//! Option structs for the mutating RPC surface
//!
//! Defaults match an interactive caller: five-minute budget, hooks on,
//! no waiting, no dry run.

use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Options for `install_release`
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Release name; empty asks the server to generate one
    pub name: String,

    /// Namespace to install into
    pub namespace: String,

    /// Compute the plan and the would-be revision without side effects
    pub dry_run: bool,

    /// Skip all lifecycle hooks
    pub disable_hooks: bool,

    /// Reuse a fully uninstalled name
    pub reuse_name: bool,

    /// Overall operation budget
    pub timeout: Duration,

    /// Poll readiness after apply
    pub wait: bool,

    /// Description recorded on the revision
    pub description: String,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace: "default".into(),
            dry_run: false,
            disable_hooks: false,
            reuse_name: false,
            timeout: DEFAULT_TIMEOUT,
            wait: false,
            description: String::new(),
        }
    }
}

/// Options for `update_release`
#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    /// Compute the plan and the would-be revision without side effects
    pub dry_run: bool,

    /// Skip all lifecycle hooks
    pub disable_hooks: bool,

    /// Delete-then-create resources that already exist, forcing restarts
    pub recreate: bool,

    /// Overall operation budget
    pub timeout: Duration,

    /// Discard the previous config and use the incoming values verbatim
    pub reset_values: bool,

    /// Poll readiness after apply
    pub wait: bool,

    /// Deep-merge incoming values over the previous config
    pub reuse_values: bool,

    /// Treat failures as cleanup-eligible, like `cleanup_on_fail`
    pub force: bool,

    /// Description recorded on the revision
    pub description: String,

    /// Delete resources created by this operation if it fails
    pub cleanup_on_fail: bool,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            disable_hooks: false,
            recreate: false,
            timeout: DEFAULT_TIMEOUT,
            reset_values: false,
            wait: false,
            reuse_values: false,
            force: false,
            description: String::new(),
            cleanup_on_fail: false,
        }
    }
}

/// Options for `rollback_release`
#[derive(Debug, Clone)]
pub struct RollbackOptions {
    /// Compute the plan and the would-be revision without side effects
    pub dry_run: bool,

    /// Skip all lifecycle hooks
    pub disable_hooks: bool,

    /// Revision to restore; 0 means the one before the latest
    pub version: u32,

    /// Delete-then-create resources that already exist, forcing restarts
    pub recreate: bool,

    /// Overall operation budget
    pub timeout: Duration,

    /// Poll readiness after apply
    pub wait: bool,

    /// Treat failures as cleanup-eligible, like `cleanup_on_fail`
    pub force: bool,

    /// Description recorded on the revision
    pub description: String,

    /// Delete resources created by this operation if it fails
    pub cleanup_on_fail: bool,
}

impl Default for RollbackOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            disable_hooks: false,
            version: 0,
            recreate: false,
            timeout: DEFAULT_TIMEOUT,
            wait: false,
            force: false,
            description: String::new(),
            cleanup_on_fail: false,
        }
    }
}

/// Options for `uninstall_release`
#[derive(Debug, Clone)]
pub struct UninstallOptions {
    /// Skip all lifecycle hooks
    pub disable_hooks: bool,

    /// Remove the entire history and free the name for reuse
    pub purge: bool,

    /// Overall operation budget
    pub timeout: Duration,

    /// Description recorded on the revision
    pub description: String,
}

impl Default for UninstallOptions {
    fn default() -> Self {
        Self {
            disable_hooks: false,
            purge: false,
            timeout: DEFAULT_TIMEOUT,
            description: String::new(),
        }
    }
}
