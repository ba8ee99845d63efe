//! Dokku application resource

use anyhow::Result;

use super::{ApplyContext, ApplyResult, Ensure, Resource, ResourceState};
use crate::dokku::Dokku;

/// An application on the host
#[derive(Debug, Clone)]
pub struct App {
    pub name: String,
    pub ensure: Ensure,
}

impl App {
    pub fn new(name: &str, ensure: Ensure) -> Self {
        Self {
            name: name.to_string(),
            ensure,
        }
    }

    fn create(&self, dokku: &Dokku) -> Result<ApplyResult> {
        match dokku.run(&dokku.cmd(["apps:create", self.name.as_str()])) {
            Ok(_) => Ok(ApplyResult::Created),
            Err(err) => Ok(ApplyResult::Failed {
                error: err.to_string(),
            }),
        }
    }

    fn destroy(&self, dokku: &Dokku) -> Result<ApplyResult> {
        let cmd = dokku.cmd(["--force", "apps:destroy", self.name.as_str()]);
        match dokku.run(&cmd) {
            Ok(_) => Ok(ApplyResult::Removed),
            Err(err) => Ok(ApplyResult::Failed {
                error: err.to_string(),
            }),
        }
    }
}

impl Resource for App {
    fn id(&self) -> String {
        format!("app:{}", self.name)
    }

    fn description(&self) -> String {
        match self.ensure {
            Ensure::Present => format!("Create app {}", self.name),
            Ensure::Absent => format!("Destroy app {}", self.name),
        }
    }

    fn resource_type(&self) -> &'static str {
        "app"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        if dokku.app_exists(&self.name) {
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
        let exists = dokku.app_exists(&self.name);

        match self.ensure {
            Ensure::Present => {
                if exists {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.create(dokku)
            }
            Ensure::Absent => {
                if !exists {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.destroy(dokku)
            }
        }
    }
}
