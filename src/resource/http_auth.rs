//! HTTP basic auth toggle for an app

use anyhow::{anyhow, Result};

use super::{ApplyContext, ApplyResult, Ensure, Resource, ResourceState};
use crate::dokku::Dokku;

/// Basic auth for one app
#[derive(Debug, Clone)]
pub struct HttpAuth {
    pub app: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ensure: Ensure,
}

impl HttpAuth {
    fn enabled(&self, dokku: &Dokku) -> Result<bool> {
        let lines = dokku.run_lines(&dokku.quiet(["http-auth:report", self.app.as_str()]))?;
        let first = lines
            .first()
            .ok_or_else(|| anyhow!("empty http-auth report for {}", self.app))?;
        let (_, value) = first
            .split_once(':')
            .ok_or_else(|| anyhow!("unexpected http-auth report line: {first:?}"))?;
        Ok(value.trim() == "true")
    }
}

impl Resource for HttpAuth {
    fn id(&self) -> String {
        format!("http-auth:{}", self.app)
    }

    fn description(&self) -> String {
        match self.ensure {
            Ensure::Present => format!("Enable HTTP auth for {}", self.app),
            Ensure::Absent => format!("Disable HTTP auth for {}", self.app),
        }
    }

    fn resource_type(&self) -> &'static str {
        "http-auth"
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
                let (Some(username), Some(password)) = (&self.username, &self.password) else {
                    return Ok(ApplyResult::Failed {
                        error: "missing required arguments: username, password".to_string(),
                    });
                };
                let cmd = dokku.quiet(["http-auth:on", self.app.as_str(), username.as_str(), password.as_str()]);
                match dokku.run(&cmd) {
                    Ok(_) => Ok(ApplyResult::Created),
                    Err(err) => Ok(ApplyResult::Failed {
                        error: err.to_string(),
                    }),
                }
            }
            Ensure::Absent => {
                if !enabled {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                match dokku.run(&dokku.quiet(["http-auth:off", self.app.as_str()])) {
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

    fn auth(ensure: Ensure) -> HttpAuth {
        HttpAuth {
            app: "api".to_string(),
            username: Some("admin".to_string()),
            password: Some("hunter2".to_string()),
            ensure,
        }
    }

    #[test]
    fn enables_auth_when_off() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet http-auth:report api", "Http auth enabled: false")
            .ok("dokku --quiet http-auth:on api admin hunter2", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));

        let mut ctx = ApplyContext::default();
        assert_eq!(
            auth(Ensure::Present).apply(&dokku, &mut ctx).unwrap(),
            ApplyResult::Created
        );
    }

    #[test]
    fn enabled_auth_is_noop() {
        let runner =
            ScriptedRunner::new().ok("dokku --quiet http-auth:report api", "Http auth enabled: true");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));

        let mut ctx = ApplyContext::default();
        assert_eq!(
            auth(Ensure::Present).apply(&dokku, &mut ctx).unwrap(),
            ApplyResult::NoChange
        );
    }

    #[test]
    fn disables_auth_when_on() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet http-auth:report api", "Http auth enabled: true")
            .ok("dokku --quiet http-auth:off api", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));

        let mut ctx = ApplyContext::default();
        assert_eq!(
            auth(Ensure::Absent).apply(&dokku, &mut ctx).unwrap(),
            ApplyResult::Removed
        );
    }
}
