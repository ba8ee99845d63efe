//! Proxy toggle for an app
//!
//! Whether the proxy is disabled lives in the `DOKKU_DISABLE_PROXY`
//! config var; a failed or empty read counts as "not disabled", the
//! same coarse reading the CLI itself applies.

use anyhow::Result;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::dokku::Dokku;

/// Proxy on/off for one app
#[derive(Debug, Clone)]
pub struct Proxy {
    pub app: String,
    pub enabled: bool,
}

impl Proxy {
    pub fn new(app: &str, enabled: bool) -> Self {
        Self {
            app: app.to_string(),
            enabled,
        }
    }

    fn disabled(&self, dokku: &Dokku) -> bool {
        let cmd = dokku.quiet(["config:get", self.app.as_str(), "DOKKU_DISABLE_PROXY"]);
        match dokku.run(&cmd) {
            Ok(captured) => captured
                .lines()
                .first()
                .is_some_and(|value| value == "1"),
            Err(_) => false,
        }
    }
}

impl Resource for Proxy {
    fn id(&self) -> String {
        format!("proxy:{}", self.app)
    }

    fn description(&self) -> String {
        if self.enabled {
            format!("Enable proxy for {}", self.app)
        } else {
            format!("Disable proxy for {}", self.app)
        }
    }

    fn resource_type(&self) -> &'static str {
        "proxy"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        if self.disabled(dokku) {
            Ok(ResourceState::Absent)
        } else {
            Ok(ResourceState::Present { details: None })
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
        let disabled = self.disabled(dokku);

        if self.enabled {
            if !disabled {
                return Ok(ApplyResult::NoChange);
            }
            if let Some(skipped) = ctx.skip_if_dry_run() {
                return Ok(skipped);
            }
            match dokku.run(&dokku.quiet(["proxy:enable", self.app.as_str()])) {
                Ok(_) => Ok(ApplyResult::modified()),
                Err(err) => Ok(ApplyResult::Failed {
                    error: err.to_string(),
                }),
            }
        } else {
            if disabled {
                return Ok(ApplyResult::NoChange);
            }
            if let Some(skipped) = ctx.skip_if_dry_run() {
                return Ok(skipped);
            }
            match dokku.run(&dokku.cmd(["--force", "proxy:disable", self.app.as_str()])) {
                Ok(_) => Ok(ApplyResult::modified()),
                Err(err) => Ok(ApplyResult::Failed {
                    error: err.to_string(),
                }),
            }
        }
    }
}
