//! Container networks and per-app network attachment properties

use anyhow::Result;
use serde::Deserialize;

use super::{ApplyContext, ApplyResult, Ensure, Resource, ResourceState};
use crate::dokku::Dokku;

/// A named container network
#[derive(Debug, Clone)]
pub struct Network {
    pub name: String,
    pub ensure: Ensure,
}

impl Network {
    pub fn new(name: &str, ensure: Ensure) -> Self {
        Self {
            name: name.to_string(),
            ensure,
        }
    }

    fn exists(&self, dokku: &Dokku) -> bool {
        dokku.succeeds(&dokku.quiet(["network:exists", self.name.as_str()]))
    }
}

impl Resource for Network {
    fn id(&self) -> String {
        format!("network:{}", self.name)
    }

    fn description(&self) -> String {
        match self.ensure {
            Ensure::Present => format!("Create network {}", self.name),
            Ensure::Absent => format!("Destroy network {}", self.name),
        }
    }

    fn resource_type(&self) -> &'static str {
        "network"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        if self.exists(dokku) {
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
        let exists = self.exists(dokku);

        match self.ensure {
            Ensure::Present => {
                if exists {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                match dokku.run(&dokku.cmd(["network:create", self.name.as_str()])) {
                    Ok(_) => Ok(ApplyResult::Created),
                    Err(err) => Ok(ApplyResult::Failed {
                        error: err.to_string(),
                    }),
                }
            }
            Ensure::Absent => {
                if !exists {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                match dokku.run(&dokku.cmd(["--force", "network:destroy", self.name.as_str()])) {
                    Ok(_) => Ok(ApplyResult::Removed),
                    Err(err) => Ok(ApplyResult::Failed {
                        error: err.to_string(),
                    }),
                }
            }
        }
    }
}

/// When the app's containers attach to the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttachPhase {
    InitialNetwork,
    AttachPostCreate,
    AttachPostDeploy,
}

impl AttachPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialNetwork => "initial-network",
            Self::AttachPostCreate => "attach-post-create",
            Self::AttachPostDeploy => "attach-post-deploy",
        }
    }
}

/// A per-app network attachment property. `network:set` has no paired
/// read subcommand, so this is write-only and always reports a change
/// when declared.
#[derive(Debug, Clone)]
pub struct NetworkProperty {
    pub app: String,
    pub network: String,
    pub phase: AttachPhase,
}

impl Resource for NetworkProperty {
    fn id(&self) -> String {
        format!("network-property:{}:{}", self.app, self.phase.as_str())
    }

    fn description(&self) -> String {
        format!(
            "Attach {} to network {} ({})",
            self.app,
            self.network,
            self.phase.as_str()
        )
    }

    fn resource_type(&self) -> &'static str {
        "network-property"
    }

    fn current_state(&self, _dokku: &Dokku) -> Result<ResourceState> {
        Ok(ResourceState::Unknown)
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::present(self.network.clone())
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if let Some(skipped) = ctx.skip_if_dry_run() {
            return Ok(skipped);
        }

        let cmd = dokku.cmd([
            "network:set",
            self.app.as_str(),
            self.phase.as_str(),
            self.network.as_str(),
        ]);
        match dokku.run(&cmd) {
            Ok(_) => Ok(ApplyResult::modified()),
            Err(err) => Ok(ApplyResult::Failed {
                error: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::ScriptedRunner;

    #[test]
    fn creates_missing_network() {
        let runner = ScriptedRunner::new()
            .fail("dokku --quiet network:exists private", "network does not exist")
            .ok("dokku network:create private", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let network = Network::new("private", Ensure::Present);

        let mut ctx = ApplyContext::default();
        assert_eq!(network.apply(&dokku, &mut ctx).unwrap(), ApplyResult::Created);
    }

    #[test]
    fn destroys_existing_network_with_force() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet network:exists private", "")
            .ok("dokku --force network:destroy private", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let network = Network::new("private", Ensure::Absent);

        let mut ctx = ApplyContext::default();
        assert_eq!(network.apply(&dokku, &mut ctx).unwrap(), ApplyResult::Removed);
    }

    #[test]
    fn property_sets_phase_then_network() {
        let runner = ScriptedRunner::new().ok("dokku network:set api attach-post-create private", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let property = NetworkProperty {
            app: "api".to_string(),
            network: "private".to_string(),
            phase: AttachPhase::AttachPostCreate,
        };

        let mut ctx = ApplyContext::default();
        assert!(property.apply(&dokku, &mut ctx).unwrap().is_change());
    }
}
