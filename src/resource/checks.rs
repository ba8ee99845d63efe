//! Zero-downtime deployment checks toggle
//!
//! The report's first line carries the disabled list; the `_all_`
//! sentinel means checks are fully off.

use anyhow::{anyhow, Result};

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::dokku::Dokku;

/// Deployment checks on/off for one app
#[derive(Debug, Clone)]
pub struct Checks {
    pub app: String,
    pub enabled: bool,
}

impl Checks {
    pub fn new(app: &str, enabled: bool) -> Self {
        Self {
            app: app.to_string(),
            enabled,
        }
    }

    fn checks_enabled(&self, dokku: &Dokku) -> Result<bool> {
        let lines = dokku.run_lines(&dokku.quiet(["checks:report", self.app.as_str()]))?;
        let first = lines
            .first()
            .ok_or_else(|| anyhow!("empty checks report for {}", self.app))?;
        let (_, value) = first
            .split_once(':')
            .ok_or_else(|| anyhow!("unexpected checks report line: {first:?}"))?;
        Ok(value.trim() != "_all_")
    }

    fn toggle(&self, dokku: &Dokku, subcommand: &str) -> Result<ApplyResult> {
        match dokku.run(&dokku.quiet([subcommand, self.app.as_str()])) {
            Ok(_) => Ok(ApplyResult::modified()),
            Err(err) => Ok(ApplyResult::Failed {
                error: err.to_string(),
            }),
        }
    }
}

impl Resource for Checks {
    fn id(&self) -> String {
        format!("checks:{}", self.app)
    }

    fn description(&self) -> String {
        if self.enabled {
            format!("Enable deployment checks for {}", self.app)
        } else {
            format!("Disable deployment checks for {}", self.app)
        }
    }

    fn resource_type(&self) -> &'static str {
        "checks"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        if self.checks_enabled(dokku)? {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        if self.enabled {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let currently_enabled = self.checks_enabled(dokku)?;

        if currently_enabled == self.enabled {
            return Ok(ApplyResult::NoChange);
        }
        if let Some(skipped) = ctx.skip_if_dry_run() {
            return Ok(skipped);
        }

        if self.enabled {
            self.toggle(dokku, "checks:enable")
        } else {
            self.toggle(dokku, "checks:disable")
        }
    }
}
