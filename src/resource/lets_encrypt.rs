//! Let's Encrypt certificates for an app
//!
//! The plugin must be installed on the host. Enablement is read from
//! the first column of `letsencrypt:ls`; enabling can also install the
//! shared renewal cron job.

use anyhow::Result;

use super::{ApplyContext, ApplyResult, Ensure, Resource, ResourceState};
use crate::dokku::Dokku;

/// Let's Encrypt on/off for one app
#[derive(Debug, Clone)]
pub struct LetsEncrypt {
    pub app: String,
    pub ensure: Ensure,
    /// Also install the renewal cron job after enabling.
    pub auto_renew: bool,
}

impl LetsEncrypt {
    pub fn new(app: &str, ensure: Ensure, auto_renew: bool) -> Self {
        Self {
            app: app.to_string(),
            ensure,
            auto_renew,
        }
    }

    fn enabled(&self, dokku: &Dokku) -> Result<bool> {
        let lines = dokku.run_lines(&dokku.quiet(["letsencrypt:ls"]))?;
        Ok(lines
            .iter()
            .filter_map(|line| line.split_whitespace().next())
            .any(|app| app == self.app))
    }
}

impl Resource for LetsEncrypt {
    fn id(&self) -> String {
        format!("lets-encrypt:{}", self.app)
    }

    fn description(&self) -> String {
        match self.ensure {
            Ensure::Present => format!("Enable Let's Encrypt for {}", self.app),
            Ensure::Absent => format!("Disable Let's Encrypt for {}", self.app),
        }
    }

    fn resource_type(&self) -> &'static str {
        "lets-encrypt"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        if self.enabled(dokku)? {
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
        let enabled = self.enabled(dokku)?;

        match self.ensure {
            Ensure::Present => {
                if enabled {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                if let Err(err) = dokku.run(&dokku.quiet(["letsencrypt:enable", self.app.as_str()])) {
                    return Ok(ApplyResult::Failed {
                        error: err.to_string(),
                    });
                }
                if self.auto_renew {
                    // Harmless to re-add; only runs on the enabling pass.
                    if let Err(err) = dokku.run(&dokku.cmd(["letsencrypt:cron-job", "--add"])) {
                        return Ok(ApplyResult::Failed {
                            error: format!("{err} (certificate was issued)"),
                        });
                    }
                }
                Ok(ApplyResult::Created)
            }
            Ensure::Absent => {
                if !enabled {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                match dokku.run(&dokku.quiet(["letsencrypt:disable", self.app.as_str()])) {
                    Ok(_) => Ok(ApplyResult::Removed),
                    Err(err) => Ok(ApplyResult::Failed {
                        error: err.to_string(),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::ScriptedRunner;

    const LISTING: &str = "-----> App name           Certificate Expiry\napi                        2026-11-06\nblog                       2026-12-01";

    #[test]
    fn app_in_first_column_reads_as_enabled() {
        let runner = ScriptedRunner::new().ok("dokku --quiet letsencrypt:ls", LISTING);
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let le = LetsEncrypt::new("api", Ensure::Present, false);

        let mut ctx = ApplyContext::default();
        assert_eq!(le.apply(&dokku, &mut ctx).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn enables_missing_app_and_installs_cron() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet letsencrypt:ls", LISTING)
            .ok("dokku --quiet letsencrypt:enable shop", "")
            .ok("dokku letsencrypt:cron-job --add", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let le = LetsEncrypt::new("shop", Ensure::Present, true);

        let mut ctx = ApplyContext::default();
        assert_eq!(le.apply(&dokku, &mut ctx).unwrap(), ApplyResult::Created);
    }

    #[test]
    fn disables_enabled_app() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet letsencrypt:ls", LISTING)
            .ok("dokku --quiet letsencrypt:disable blog", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let le = LetsEncrypt::new("blog", Ensure::Absent, false);

        let mut ctx = ApplyContext::default();
        assert_eq!(le.apply(&dokku, &mut ctx).unwrap(), ApplyResult::Removed);
    }
}
