//! Docker options attached to an app's build/deploy/run phases
//!
//! The listing is sectioned ("Build options:", "Deploy options:", "Run
//! options:") rather than key/value, so it gets its own small parser.

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;

use super::{ApplyContext, ApplyResult, Ensure, Resource, ResourceState};
use crate::dokku::Dokku;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Build,
    Deploy,
    Run,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Deploy => "deploy",
            Self::Run => "run",
        }
    }

    fn section_header(self) -> &'static str {
        match self {
            Self::Build => "Build options:",
            Self::Deploy => "Deploy options:",
            Self::Run => "Run options:",
        }
    }
}

/// One docker option in one phase
#[derive(Debug, Clone)]
pub struct DockerOption {
    pub app: String,
    pub phase: Phase,
    pub option: String,
    pub ensure: Ensure,
}

impl DockerOption {
    pub fn new(app: &str, phase: Phase, option: &str, ensure: Ensure) -> Self {
        Self {
            app: app.to_string(),
            phase,
            option: option.to_string(),
            ensure,
        }
    }

    fn existing(&self, dokku: &Dokku) -> Result<BTreeMap<Phase, Vec<String>>> {
        let lines = dokku.run_lines(&dokku.quiet(["docker-options", self.app.as_str()]))?;
        Ok(parse_sections(&lines))
    }

    fn option_present(&self, options: &BTreeMap<Phase, Vec<String>>) -> bool {
        options
            .get(&self.phase)
            .is_some_and(|phase_options| phase_options.contains(&self.option))
    }

    fn mutate(&self, dokku: &Dokku, subcommand: &str, done: ApplyResult) -> Result<ApplyResult> {
        let cmd = dokku.quiet([
            subcommand,
            self.app.as_str(),
            self.phase.as_str(),
            self.option.as_str(),
        ]);
        match dokku.run(&cmd) {
            Ok(_) => Ok(done),
            Err(err) => Ok(ApplyResult::Failed {
                error: err.to_string(),
            }),
        }
    }
}

/// Split the sectioned listing into per-phase option lists.
fn parse_sections(lines: &[String]) -> BTreeMap<Phase, Vec<String>> {
    let mut options: BTreeMap<Phase, Vec<String>> = BTreeMap::new();
    let mut current = Phase::Build;

    for line in lines {
        if let Some(phase) = [Phase::Build, Phase::Deploy, Phase::Run]
            .into_iter()
            .find(|phase| line == phase.section_header())
        {
            current = phase;
            continue;
        }
        options.entry(current).or_default().push(line.clone());
    }

    options
}

impl Resource for DockerOption {
    fn id(&self) -> String {
        format!("docker-options:{}:{}", self.app, self.phase.as_str())
    }

    fn description(&self) -> String {
        match self.ensure {
            Ensure::Present => format!(
                "Add {} docker option to {}: {}",
                self.phase.as_str(),
                self.app,
                self.option
            ),
            Ensure::Absent => format!(
                "Remove {} docker option from {}: {}",
                self.phase.as_str(),
                self.app,
                self.option
            ),
        }
    }

    fn resource_type(&self) -> &'static str {
        "docker-options"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        let present = self.option_present(&self.existing(dokku)?);
        if present {
            Ok(ResourceState::present(self.option.clone()))
        } else {
            Ok(ResourceState::Absent)
        }
    }

    fn desired_state(&self) -> ResourceState {
        match self.ensure {
            Ensure::Present => ResourceState::present(self.option.clone()),
            Ensure::Absent => ResourceState::Absent,
        }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let present = self.option_present(&self.existing(dokku)?);

        match self.ensure {
            Ensure::Present => {
                if present {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.mutate(dokku, "docker-options:add", ApplyResult::Created)
            }
            Ensure::Absent => {
                if !present {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.mutate(dokku, "docker-options:remove", ApplyResult::Removed)
            }
        }
    }
}
