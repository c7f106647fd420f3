//! Rendered chart bundle types
//!
//! The core consumes charts fully rendered: template expansion happens
//! upstream, so a [`Chart`] here is metadata plus concrete manifests.

use crate::hook::Hook;
use serde::{Deserialize, Serialize};

/// A rendered chart bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    /// Chart identity
    pub metadata: ChartMetadata,

    /// Rendered manifests making up the main resource set
    pub resources: Vec<Resource>,

    /// Lifecycle hooks declared by the chart, in declaration order
    pub hooks: Vec<Hook>,
}

impl Chart {
    /// Create a chart with no resources or hooks.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            metadata: ChartMetadata {
                name: name.into(),
                version: version.into(),
            },
            resources: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Add a rendered resource manifest.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Add a lifecycle hook.
    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }
}

/// Chart identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartMetadata {
    /// Chart name
    pub name: String,

    /// Chart version string (opaque to the core)
    pub version: String,
}

/// One rendered manifest
///
/// Resources are identified by `(kind, name)` when diffing revisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name
    pub name: String,

    /// Resource kind
    pub kind: String,

    /// Rendered manifest body (opaque to the core)
    pub manifest: String,
}

impl Resource {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        manifest: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            manifest: manifest.into(),
        }
    }

    /// Identity reference for this resource.
    pub fn reference(&self) -> ResourceRef {
        ResourceRef {
            kind: self.kind.clone(),
            name: self.name.clone(),
        }
    }
}

/// Identity of a cluster resource, without its manifest body
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}
