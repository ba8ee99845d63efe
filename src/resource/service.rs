//! Datastore service instances and app links
//!
//! Services are plugin-provided (`postgres:*`, `redis:*`, ...); the
//! plugin must be installed on the host or every subcommand fails. A
//! link requires both the service instance and the app to exist.

use anyhow::Result;

use super::{ApplyContext, ApplyResult, Ensure, Resource, ResourceState};
use crate::dokku::Dokku;

/// A named instance of a datastore service (create-only; dokku offers
/// no declarative destroy that is safe to run unattended).
#[derive(Debug, Clone)]
pub struct ServiceInstance {
    pub service: String,
    pub name: String,
}

impl ServiceInstance {
    pub fn new(service: &str, name: &str) -> Self {
        Self {
            service: service.to_string(),
            name: name.to_string(),
        }
    }

    fn exists(&self, dokku: &Dokku) -> bool {
        dokku.succeeds(&dokku.quiet([format!("{}:exists", self.service), self.name.clone()]))
    }
}

impl Resource for ServiceInstance {
    fn id(&self) -> String {
        format!("service:{}:{}", self.service, self.name)
    }

    fn description(&self) -> String {
        format!("Create {} service {}", self.service, self.name)
    }

    fn resource_type(&self) -> &'static str {
        "service"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        if self.exists(dokku) {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if self.exists(dokku) {
            return Ok(ApplyResult::NoChange);
        }
        if let Some(skipped) = ctx.skip_if_dry_run() {
            return Ok(skipped);
        }

        let cmd = dokku.cmd([format!("{}:create", self.service), self.name.clone()]);
        match dokku.run(&cmd) {
            Ok(_) => Ok(ApplyResult::Created),
            Err(err) => Ok(ApplyResult::Failed {
                error: err.to_string(),
            }),
        }
    }
}

/// A link between a service instance and an app
#[derive(Debug, Clone)]
pub struct ServiceLink {
    pub service: String,
    pub name: String,
    pub app: String,
    pub ensure: Ensure,
}

impl ServiceLink {
    fn service_exists(&self, dokku: &Dokku) -> bool {
        dokku.succeeds(&dokku.quiet([format!("{}:exists", self.service), self.name.clone()]))
    }

    fn linked(&self, dokku: &Dokku) -> bool {
        dokku.succeeds(&dokku.quiet([
            format!("{}:linked", self.service),
            self.name.clone(),
            self.app.clone(),
        ]))
    }

    /// Both endpoints must exist before a link can be reasoned about.
    fn check_endpoints(&self, dokku: &Dokku) -> Option<ApplyResult> {
        if !self.service_exists(dokku) {
            return Some(ApplyResult::Failed {
                error: format!("{} service {} does not exist", self.service, self.name),
            });
        }
        if !dokku.app_exists(&self.app) {
            return Some(ApplyResult::Failed {
                error: format!("app {} does not exist", self.app),
            });
        }
        None
    }
}

impl Resource for ServiceLink {
    fn id(&self) -> String {
        format!("link:{}:{}:{}", self.service, self.name, self.app)
    }

    fn description(&self) -> String {
        match self.ensure {
            Ensure::Present => format!(
                "Link {} service {} to {}",
                self.service, self.name, self.app
            ),
            Ensure::Absent => format!(
                "Unlink {} service {} from {}",
                self.service, self.name, self.app
            ),
        }
    }

    fn resource_type(&self) -> &'static str {
        "service-link"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        if self.linked(dokku) {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        match self.ensure {
            Ensure::Present => ResourceState::Present { details: None },
            Ensure::Absent => ResourceState::Absent,
        }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if let Some(failed) = self.check_endpoints(dokku) {
            return Ok(failed);
        }

        let linked = self.linked(dokku);

        match self.ensure {
            Ensure::Present => {
                if linked {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                let cmd = dokku.quiet([
                    format!("{}:link", self.service),
                    self.name.clone(),
                    self.app.clone(),
                ]);
                match dokku.run(&cmd) {
                    Ok(_) => Ok(ApplyResult::Created),
                    Err(err) => Ok(ApplyResult::Failed {
                        error: err.to_string(),
                    }),
                }
            }
            Ensure::Absent => {
                if !linked {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                let cmd = dokku.quiet([
                    format!("{}:unlink", self.service),
                    self.name.clone(),
                    self.app.clone(),
                ]);
                match dokku.run(&cmd) {
                    Ok(_) => Ok(ApplyResult::Removed),
                    Err(err) => Ok(ApplyResult::Failed {
                        error: err.to_string(),
                    }),
                }
            }
        }
    }
}
