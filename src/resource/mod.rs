//! Resource trait and types for declarative Dokku state
//!
//! Every manageable piece of host state is modeled as a Resource with:
//! - State detection (current vs desired), read fresh from the host
//! - Apply function (converge current -> desired via dokku subcommands)
//!
//! Application is strictly sequential; a resource runs its subcommands
//! one at a time and the first failure aborts that resource's remaining
//! steps with no rollback.

use anyhow::Result;
use serde::Deserialize;
use std::fmt;

use crate::dokku::Dokku;

/// Whether a resource should exist or not. The manifest default is
/// `present`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

impl ResourceState {
    pub fn present(details: impl Into<String>) -> Self {
        Self::Present {
            details: Some(details.into()),
        }
    }
}

/// Result of applying a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified; for multi-key resources `changed` names
    /// the properties actually written
    Modified { changed: Vec<String> },
    /// Resource was removed
    Removed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    pub fn modified() -> Self {
        Self::Modified {
            changed: Vec::new(),
        }
    }

    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified { .. } | Self::Removed)
    }
}

/// Context passed to apply operations
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyContext {
    pub dry_run: bool,
}

impl ApplyContext {
    /// The standard dry-run short circuit used by every resource.
    pub fn skip_if_dry_run(&self) -> Option<ApplyResult> {
        if self.dry_run {
            Some(ApplyResult::Skipped {
                reason: "Dry run".to_string(),
            })
        } else {
            None
        }
    }
}

/// Core trait for all resources
pub trait Resource: fmt::Debug {
    /// Unique identifier (e.g. "app:hello-world", "domains:hello-world")
    fn id(&self) -> String;

    /// Human-readable description
    fn description(&self) -> String;

    /// Resource type category (e.g. "app", "domains", "config")
    fn resource_type(&self) -> &'static str;

    /// Detect current state by querying the host. Never cached; every
    /// call re-reads from dokku.
    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState>;

    /// The desired state (from the manifest)
    fn desired_state(&self) -> ResourceState;

    /// Check if resource needs changes
    fn needs_apply(&self, dokku: &Dokku) -> Result<bool> {
        Ok(self.current_state(dokku)? != self.desired_state())
    }

    /// Apply changes to reach desired state
    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult>;
}

/// A diff between current and desired state
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    pub resource_id: String,
    pub resource_type: String,
    pub description: String,
    pub current: ResourceState,
    pub desired: ResourceState,
}

impl ResourceDiff {
    /// Compute the diff for one resource, `None` when already converged.
    pub fn from_resource(resource: &dyn Resource, dokku: &Dokku) -> Result<Option<Self>> {
        let current = resource.current_state(dokku)?;
        let desired = resource.desired_state();

        if current == desired {
            return Ok(None);
        }

        Ok(Some(Self {
            resource_id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current,
            desired,
        }))
    }
}

// Re-export submodules
pub mod acl;
pub mod app;
pub mod buildpacks;
pub mod builder;
pub mod cert;
pub mod checks;
pub mod config_env;
pub mod docker_options;
pub mod domains;
pub mod ecr;
pub mod git;
pub mod git_sync;
pub mod http_auth;
pub mod lets_encrypt;
pub mod limits;
pub mod network;
pub mod ports;
pub mod properties;
pub mod proxy;
pub mod ps_scale;
pub mod registry;
pub mod service;
pub mod storage;
