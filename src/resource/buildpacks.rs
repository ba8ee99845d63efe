//! Ordered buildpack list for an app
//!
//! Buildpack order is meaningful, so the list is compared as a whole;
//! on mismatch the current list is cleared and rebuilt in declared
//! order. Indexed add/set/remove could patch single entries instead,
//! but clear-and-rebuild keeps the command sequence deterministic.

use anyhow::Result;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::dokku::Dokku;

/// The full buildpack list for one app
#[derive(Debug, Clone)]
pub struct Buildpacks {
    pub app: String,
    pub buildpacks: Vec<String>,
}

impl Buildpacks {
    pub fn new(app: &str, buildpacks: Vec<String>) -> Self {
        Self {
            app: app.to_string(),
            buildpacks,
        }
    }

    fn existing(&self, dokku: &Dokku) -> Result<Vec<String>> {
        Ok(dokku.run_lines(&dokku.quiet(["buildpacks:list", self.app.as_str()]))?)
    }
}

impl Resource for Buildpacks {
    fn id(&self) -> String {
        format!("buildpacks:{}", self.app)
    }

    fn description(&self) -> String {
        format!("Set buildpacks of {}", self.app)
    }

    fn resource_type(&self) -> &'static str {
        "buildpacks"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        let existing = self.existing(dokku)?;
        if existing == self.buildpacks {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Modified {
                from: existing.join("\n"),
                to: self.buildpacks.join("\n"),
            })
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existing = self.existing(dokku)?;
        if existing == self.buildpacks {
            return Ok(ApplyResult::NoChange);
        }
        if let Some(skipped) = ctx.skip_if_dry_run() {
            return Ok(skipped);
        }

        if !existing.is_empty() {
            if let Err(err) = dokku.run(&dokku.quiet(["buildpacks:clear", self.app.as_str()])) {
                return Ok(ApplyResult::Failed {
                    error: err.to_string(),
                });
            }
        }

        let mut changed = Vec::new();
        for buildpack in &self.buildpacks {
            let cmd = dokku.quiet(["buildpacks:add", self.app.as_str(), buildpack.as_str()]);
            if let Err(err) = dokku.run(&cmd) {
                return Ok(ApplyResult::Failed {
                    error: if changed.is_empty() {
                        err.to_string()
                    } else {
                        format!("{err} (added before failure: {})", changed.join(", "))
                    },
                });
            }
            changed.push(buildpack.clone());
        }

        Ok(ApplyResult::Modified { changed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::ScriptedRunner;

    fn packs(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn matching_ordered_list_is_noop() {
        let runner = ScriptedRunner::new().ok(
            "dokku --quiet buildpacks:list api",
            "https://github.com/heroku/heroku-buildpack-nodejs\nhttps://github.com/heroku/heroku-buildpack-ruby",
        );
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let buildpacks = Buildpacks::new(
            "api",
            packs(&[
                "https://github.com/heroku/heroku-buildpack-nodejs",
                "https://github.com/heroku/heroku-buildpack-ruby",
            ]),
        );

        let mut ctx = ApplyContext::default();
        assert_eq!(buildpacks.apply(&dokku, &mut ctx).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn order_change_rebuilds_the_list() {
        let runner = ScriptedRunner::new()
            .ok(
                "dokku --quiet buildpacks:list api",
                "https://example.com/ruby\nhttps://example.com/nodejs",
            )
            .ok("dokku --quiet buildpacks:clear api", "")
            .ok("dokku --quiet buildpacks:add api https://example.com/nodejs", "")
            .ok("dokku --quiet buildpacks:add api https://example.com/ruby", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let buildpacks = Buildpacks::new(
            "api",
            packs(&["https://example.com/nodejs", "https://example.com/ruby"]),
        );

        let mut ctx = ApplyContext::default();
        let result = buildpacks.apply(&dokku, &mut ctx).unwrap();
        assert_eq!(
            result,
            ApplyResult::Modified {
                changed: packs(&["https://example.com/nodejs", "https://example.com/ruby"])
            }
        );
    }

    #[test]
    fn empty_current_list_skips_the_clear() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet buildpacks:list api", "")
            .ok("dokku --quiet buildpacks:add api https://example.com/nodejs", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let buildpacks = Buildpacks::new("api", packs(&["https://example.com/nodejs"]));

        let mut ctx = ApplyContext::default();
        assert!(buildpacks.apply(&dokku, &mut ctx).unwrap().is_change());
    }

    #[test]
    fn dry_run_reports_skip() {
        let runner = ScriptedRunner::new().ok("dokku --quiet buildpacks:list api", "https://example.com/ruby");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let buildpacks = Buildpacks::new("api", packs(&["https://example.com/nodejs"]));

        let mut ctx = ApplyContext { dry_run: true };
        assert!(matches!(
            buildpacks.apply(&dokku, &mut ctx).unwrap(),
            ApplyResult::Skipped { .. }
        ));
    }
}
