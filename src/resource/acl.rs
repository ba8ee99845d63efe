//! Per-app ACL user list
//!
//! The acl plugin writes its listing to stderr, so the read merges
//! stderr into the captured stream. Users are added or removed one at
//! a time; the first failure aborts the rest of the list.

use anyhow::Result;
use std::collections::BTreeSet;

use super::{ApplyContext, ApplyResult, Ensure, Resource, ResourceState};
use crate::dokku::Dokku;

/// Users allowed to push one app
#[derive(Debug, Clone)]
pub struct AppAcl {
    pub app: String,
    pub users: Vec<String>,
    pub ensure: Ensure,
}

impl AppAcl {
    pub fn new(app: &str, users: Vec<String>, ensure: Ensure) -> Self {
        Self {
            app: app.to_string(),
            users,
            ensure,
        }
    }

    fn existing(&self, dokku: &Dokku) -> Result<BTreeSet<String>> {
        let cmd = dokku.cmd(["acl:list", self.app.as_str()]).merge_stderr();
        Ok(dokku.run_lines(&cmd)?.into_iter().collect())
    }

    fn pending(&self, existing: &BTreeSet<String>) -> Vec<String> {
        match self.ensure {
            Ensure::Present => self
                .users
                .iter()
                .filter(|user| !existing.contains(*user))
                .cloned()
                .collect(),
            Ensure::Absent => self
                .users
                .iter()
                .filter(|user| existing.contains(*user))
                .cloned()
                .collect(),
        }
    }
}

impl Resource for AppAcl {
    fn id(&self) -> String {
        format!("acl:{}", self.app)
    }

    fn description(&self) -> String {
        match self.ensure {
            Ensure::Present => format!("Grant push access on {}", self.app),
            Ensure::Absent => format!("Revoke push access on {}", self.app),
        }
    }

    fn resource_type(&self) -> &'static str {
        "acl"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        let existing = self.existing(dokku)?;
        let pending = self.pending(&existing);

        let state = match (self.ensure, pending.is_empty()) {
            (Ensure::Present, true) => ResourceState::Present { details: None },
            (Ensure::Present, false) => ResourceState::Modified {
                from: existing.iter().cloned().collect::<Vec<_>>().join(", "),
                to: format!("+{}", pending.join(", +")),
            },
            (Ensure::Absent, true) => ResourceState::Absent,
            (Ensure::Absent, false) => ResourceState::present(pending.join(", ")),
        };
        Ok(state)
    }

    fn desired_state(&self) -> ResourceState {
        match self.ensure {
            Ensure::Present => ResourceState::Present { details: None },
            Ensure::Absent => ResourceState::Absent,
        }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existing = self.existing(dokku)?;
        let pending = self.pending(&existing);

        if pending.is_empty() {
            return Ok(ApplyResult::NoChange);
        }
        if let Some(skipped) = ctx.skip_if_dry_run() {
            return Ok(skipped);
        }

        let subcommand = match self.ensure {
            Ensure::Present => "acl:add",
            Ensure::Absent => "acl:remove",
        };

        let mut changed = Vec::new();
        for user in &pending {
            if let Err(err) = dokku.run(&dokku.quiet([subcommand, self.app.as_str(), user.as_str()])) {
                return Ok(ApplyResult::Failed {
                    error: if changed.is_empty() {
                        err.to_string()
                    } else {
                        format!("{err} (changed before failure: {})", changed.join(", "))
                    },
                });
            }
            changed.push(user.clone());
        }

        Ok(ApplyResult::Modified { changed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::ScriptedRunner;

    fn users(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn grants_missing_users_only() {
        let runner = ScriptedRunner::new()
            .ok("dokku acl:list api", "alice")
            .ok("dokku --quiet acl:add api bob", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let acl = AppAcl::new("api", users(&["alice", "bob"]), Ensure::Present);

        let mut ctx = ApplyContext::default();
        assert_eq!(
            acl.apply(&dokku, &mut ctx).unwrap(),
            ApplyResult::Modified {
                changed: users(&["bob"])
            }
        );
    }

    #[test]
    fn revokes_present_users_only() {
        let runner = ScriptedRunner::new()
            .ok("dokku acl:list api", "alice\nbob")
            .ok("dokku --quiet acl:remove api bob", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let acl = AppAcl::new("api", users(&["bob", "mallory"]), Ensure::Absent);

        let mut ctx = ApplyContext::default();
        assert_eq!(
            acl.apply(&dokku, &mut ctx).unwrap(),
            ApplyResult::Modified {
                changed: users(&["bob"])
            }
        );
    }

    #[test]
    fn converged_acl_is_noop() {
        let runner = ScriptedRunner::new().ok("dokku acl:list api", "alice\nbob");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let acl = AppAcl::new("api", users(&["alice", "bob"]), Ensure::Present);

        let mut ctx = ApplyContext::default();
        assert_eq!(acl.apply(&dokku, &mut ctx).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn failure_mid_list_reports_partial_progress() {
        let runner = ScriptedRunner::new()
            .ok("dokku acl:list api", "")
            .ok("dokku --quiet acl:add api alice", "")
            .fail("dokku --quiet acl:add api bob", "user bob is unknown");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let acl = AppAcl::new("api", users(&["alice", "bob"]), Ensure::Present);

        let mut ctx = ApplyContext::default();
        match acl.apply(&dokku, &mut ctx).unwrap() {
            ApplyResult::Failed { error } => {
                assert!(error.contains("user bob is unknown"));
                assert!(error.contains("alice"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
