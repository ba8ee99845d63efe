//! Process scaling per proc type

use anyhow::Result;
use std::collections::BTreeMap;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::dokku::Dokku;

/// Desired process counts for one app
#[derive(Debug, Clone)]
pub struct ProcessScale {
    pub app: String,
    pub scale: BTreeMap<String, u32>,
    /// Scale the records without triggering a deploy.
    pub skip_deploy: bool,
}

impl ProcessScale {
    pub fn new(app: &str, scale: BTreeMap<String, u32>, skip_deploy: bool) -> Self {
        Self {
            app: app.to_string(),
            scale,
            skip_deploy,
        }
    }

    fn existing(&self, dokku: &Dokku) -> Result<BTreeMap<String, u32>> {
        let lines = dokku.run_lines(&dokku.quiet(["ps:scale", self.app.as_str()]))?;
        let mut scale = BTreeMap::new();

        for line in &lines {
            let squeezed: String = line.chars().filter(|c| !c.is_whitespace()).collect();
            let Some((proctype, qty)) = squeezed.split_once(':') else {
                continue;
            };
            if let Ok(qty) = qty.parse::<u32>() {
                scale.insert(proctype.to_string(), qty);
            }
        }

        Ok(scale)
    }

    fn to_scale(&self, existing: &BTreeMap<String, u32>) -> Vec<(String, u32)> {
        self.scale
            .iter()
            .filter(|(proctype, qty)| existing.get(*proctype) != Some(*qty))
            .map(|(proctype, qty)| (proctype.clone(), *qty))
            .collect()
    }
}

impl Resource for ProcessScale {
    fn id(&self) -> String {
        format!("ps-scale:{}", self.app)
    }

    fn description(&self) -> String {
        format!("Scale processes of {}", self.app)
    }

    fn resource_type(&self) -> &'static str {
        "ps-scale"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        let existing = self.existing(dokku)?;
        let to_scale = self.to_scale(&existing);

        if to_scale.is_empty() {
            Ok(ResourceState::Present { details: None })
        } else {
            let from = to_scale
                .iter()
                .map(|(proctype, _)| {
                    format!("{proctype}={}", existing.get(proctype).copied().unwrap_or(0))
                })
                .collect::<Vec<_>>()
                .join(", ");
            let to = to_scale
                .iter()
                .map(|(proctype, qty)| format!("{proctype}={qty}"))
                .collect::<Vec<_>>()
                .join(", ");
            Ok(ResourceState::Modified { from, to })
        }
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existing = self.existing(dokku)?;
        let to_scale = self.to_scale(&existing);

        if to_scale.is_empty() {
            return Ok(ApplyResult::NoChange);
        }
        if let Some(skipped) = ctx.skip_if_dry_run() {
            return Ok(skipped);
        }

        let mut args = vec!["ps:scale".to_string()];
        if self.skip_deploy {
            args.push("--skip-deploy".to_string());
        }
        args.push(self.app.clone());
        args.extend(
            to_scale
                .iter()
                .map(|(proctype, qty)| format!("{proctype}={qty}")),
        );

        match dokku.run(&dokku.cmd(args)) {
            Ok(_) => Ok(ApplyResult::Modified {
                changed: to_scale.into_iter().map(|(proctype, _)| proctype).collect(),
            }),
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

    fn scale(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn parses_aligned_scale_listing() {
        let runner = ScriptedRunner::new().ok(
            "dokku --quiet ps:scale api",
            "web:      2\nworker:   1",
        );
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let ps = ProcessScale::new("api", scale(&[]), false);

        let existing = ps.existing(&dokku).unwrap();
        assert_eq!(existing, scale(&[("web", 2), ("worker", 1)]));
    }

    #[test]
    fn scales_only_differing_proc_types() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet ps:scale api", "web:      2\nworker:   1")
            .ok("dokku ps:scale api worker=3", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let ps = ProcessScale::new("api", scale(&[("web", 2), ("worker", 3)]), false);

        let mut ctx = ApplyContext::default();
        let result = ps.apply(&dokku, &mut ctx).unwrap();
        assert_eq!(
            result,
            ApplyResult::Modified {
                changed: vec!["worker".to_string()]
            }
        );
    }

    #[test]
    fn matching_scale_is_noop() {
        let runner = ScriptedRunner::new().ok("dokku --quiet ps:scale api", "web:      2");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let ps = ProcessScale::new("api", scale(&[("web", 2)]), false);

        let mut ctx = ApplyContext::default();
        assert_eq!(ps.apply(&dokku, &mut ctx).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn skip_deploy_adds_the_flag() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet ps:scale api", "web:      1")
            .ok("dokku ps:scale --skip-deploy api web=2", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let ps = ProcessScale::new("api", scale(&[("web", 2)]), true);

        let mut ctx = ApplyContext::default();
        assert!(ps.apply(&dokku, &mut ctx).unwrap().is_change());
    }
}
