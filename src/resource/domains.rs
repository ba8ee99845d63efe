//! Domain names attached to an application
//!
//! `present` adds the missing names and `absent` removes the declared
//! ones, leaving other names alone. `set` replaces the whole list,
//! `clear` empties it, and `enable`/`disable` toggle the vhost feature
//! (detected through the "No domain names set" sentinel line).

use anyhow::Result;
use serde::Deserialize;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::dokku::Dokku;

const NO_DOMAINS_SENTINEL: &str = "No domain names set";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainState {
    #[default]
    Present,
    Absent,
    Set,
    Clear,
    Enable,
    Disable,
}

/// Domain list for one app
#[derive(Debug, Clone)]
pub struct Domains {
    pub app: String,
    pub domains: Vec<String>,
    pub state: DomainState,
}

impl Domains {
    pub fn new(app: &str, domains: Vec<String>, state: DomainState) -> Self {
        Self {
            app: app.to_string(),
            domains,
            state,
        }
    }

    fn existing(&self, dokku: &Dokku) -> Result<Vec<String>> {
        Ok(dokku.run_lines(&dokku.quiet(["domains", self.app.as_str()]))?)
    }

    fn vhosts_enabled(lines: &[String]) -> bool {
        !lines.iter().any(|line| line.starts_with(NO_DOMAINS_SENTINEL))
    }

    fn to_add(&self, existing: &[String]) -> Vec<String> {
        self.domains
            .iter()
            .filter(|domain| !existing.contains(*domain))
            .cloned()
            .collect()
    }

    fn to_remove(&self, existing: &[String]) -> Vec<String> {
        self.domains
            .iter()
            .filter(|domain| existing.contains(*domain))
            .cloned()
            .collect()
    }

    /// Set-wise comparison; dokku does not treat order as meaningful.
    fn matches_exactly(&self, existing: &[String]) -> bool {
        let mut wanted = self.domains.clone();
        let mut current: Vec<String> = existing
            .iter()
            .filter(|line| !line.starts_with(NO_DOMAINS_SENTINEL))
            .cloned()
            .collect();
        wanted.sort();
        wanted.dedup();
        current.sort();
        wanted == current
    }

    fn run_subcommand(
        &self,
        dokku: &Dokku,
        subcommand: &str,
        domains: &[String],
    ) -> Result<ApplyResult> {
        let mut args = vec![subcommand.to_string(), self.app.clone()];
        args.extend(domains.iter().cloned());
        match dokku.run(&dokku.quiet(args)) {
            Ok(_) => Ok(ApplyResult::Modified {
                changed: domains.to_vec(),
            }),
            Err(err) => Ok(ApplyResult::Failed {
                error: err.to_string(),
            }),
        }
    }
}

impl Resource for Domains {
    fn id(&self) -> String {
        format!("domains:{}", self.app)
    }

    fn description(&self) -> String {
        match self.state {
            DomainState::Present => format!("Add domains to {}", self.app),
            DomainState::Absent => format!("Remove domains from {}", self.app),
            DomainState::Set => format!("Set domains of {}", self.app),
            DomainState::Clear => format!("Clear domains of {}", self.app),
            DomainState::Enable => format!("Enable vhosts for {}", self.app),
            DomainState::Disable => format!("Disable vhosts for {}", self.app),
        }
    }

    fn resource_type(&self) -> &'static str {
        "domains"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        let existing = self.existing(dokku)?;

        let state = match self.state {
            DomainState::Present => {
                let missing = self.to_add(&existing);
                if missing.is_empty() {
                    ResourceState::Present { details: None }
                } else {
                    ResourceState::Modified {
                        from: existing.join(", "),
                        to: format!("+{}", missing.join(", +")),
                    }
                }
            }
            DomainState::Absent => {
                let present = self.to_remove(&existing);
                if present.is_empty() {
                    ResourceState::Absent
                } else {
                    ResourceState::present(present.join(", "))
                }
            }
            DomainState::Set => {
                if self.matches_exactly(&existing) {
                    ResourceState::Present { details: None }
                } else {
                    ResourceState::Modified {
                        from: existing.join(", "),
                        to: self.domains.join(", "),
                    }
                }
            }
            DomainState::Clear => {
                if existing.is_empty() || !Self::vhosts_enabled(&existing) {
                    ResourceState::Absent
                } else {
                    ResourceState::present(existing.join(", "))
                }
            }
            DomainState::Enable => {
                if Self::vhosts_enabled(&existing) {
                    ResourceState::Present { details: None }
                } else {
                    ResourceState::Absent
                }
            }
            DomainState::Disable => {
                if Self::vhosts_enabled(&existing) {
                    ResourceState::present("vhosts enabled")
                } else {
                    ResourceState::Absent
                }
            }
        };

        Ok(state)
    }

    fn desired_state(&self) -> ResourceState {
        match self.state {
            DomainState::Present | DomainState::Set | DomainState::Enable => {
                ResourceState::Present { details: None }
            }
            DomainState::Absent | DomainState::Clear | DomainState::Disable => ResourceState::Absent,
        }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existing = self.existing(dokku)?;

        match self.state {
            DomainState::Present => {
                let to_add = self.to_add(&existing);
                if to_add.is_empty() {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.run_subcommand(dokku, "domains:add", &to_add)
            }
            DomainState::Absent => {
                let to_remove = self.to_remove(&existing);
                if to_remove.is_empty() {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.run_subcommand(dokku, "domains:remove", &to_remove)
            }
            DomainState::Set => {
                if self.matches_exactly(&existing) {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.run_subcommand(dokku, "domains:set", &self.domains)
            }
            DomainState::Clear => {
                if existing.is_empty() || !Self::vhosts_enabled(&existing) {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.run_subcommand(dokku, "domains:clear", &[])
            }
            DomainState::Enable => {
                if Self::vhosts_enabled(&existing) {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.run_subcommand(dokku, "domains:enable", &[])
            }
            DomainState::Disable => {
                if !Self::vhosts_enabled(&existing) {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.run_subcommand(dokku, "domains:disable", &[])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use reconcile::ScriptedRunner;

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn present_adds_only_the_missing_domains() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet domains hello-world", "b.example")
            .ok("dokku --quiet domains:add hello-world a.example", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let domains = Domains::new(
            "hello-world",
            names(&["a.example", "b.example"]),
            DomainState::Present,
        );

        let mut ctx = ApplyContext::default();
        let result = domains.apply(&dokku, &mut ctx).unwrap();

        assert_eq!(
            result,
            ApplyResult::Modified {
                changed: names(&["a.example"])
            }
        );
    }

    #[test]
    fn present_with_all_domains_attached_is_noop() {
        let runner =
            ScriptedRunner::new().ok("dokku --quiet domains hello-world", "a.example\nb.example");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let domains = Domains::new(
            "hello-world",
            names(&["a.example", "b.example"]),
            DomainState::Present,
        );

        let mut ctx = ApplyContext::default();
        assert_eq!(domains.apply(&dokku, &mut ctx).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn absent_removes_only_attached_domains() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet domains hello-world", "a.example\nc.example")
            .ok("dokku --quiet domains:remove hello-world a.example", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let domains = Domains::new(
            "hello-world",
            names(&["a.example", "b.example"]),
            DomainState::Absent,
        );

        let mut ctx = ApplyContext::default();
        let result = domains.apply(&dokku, &mut ctx).unwrap();
        assert_eq!(
            result,
            ApplyResult::Modified {
                changed: names(&["a.example"])
            }
        );
    }

    #[test]
    fn set_is_idempotent_regardless_of_order() {
        let runner =
            ScriptedRunner::new().ok("dokku --quiet domains hello-world", "b.example\na.example");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let domains = Domains::new(
            "hello-world",
            names(&["a.example", "b.example"]),
            DomainState::Set,
        );

        let mut ctx = ApplyContext::default();
        assert_eq!(domains.apply(&dokku, &mut ctx).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn enable_detects_the_sentinel() {
        let runner = ScriptedRunner::new()
            .ok(
                "dokku --quiet domains hello-world",
                "No domain names set for hello-world",
            )
            .ok("dokku --quiet domains:enable hello-world", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let domains = Domains::new("hello-world", Vec::new(), DomainState::Enable);

        let mut ctx = ApplyContext::default();
        let result = domains.apply(&dokku, &mut ctx).unwrap();
        assert!(result.is_change());
    }

    #[test]
    fn disable_when_already_disabled_is_noop() {
        let runner = ScriptedRunner::new().ok(
            "dokku --quiet domains hello-world",
            "No domain names set for hello-world",
        );
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let domains = Domains::new("hello-world", Vec::new(), DomainState::Disable);

        let mut ctx = ApplyContext::default();
        assert_eq!(domains.apply(&dokku, &mut ctx).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn dry_run_reports_skip_without_writing() {
        let runner = ScriptedRunner::new().ok("dokku --quiet domains hello-world", "b.example");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let domains = Domains::new("hello-world", names(&["a.example"]), DomainState::Present);

        let mut ctx = ApplyContext { dry_run: true };
        // Only the read is scripted; a write attempt would surface as a
        // Failed result instead of Skipped.
        let result = domains.apply(&dokku, &mut ctx).unwrap();
        assert!(matches!(result, ApplyResult::Skipped { .. }));
    }
}
