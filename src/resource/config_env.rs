//! Environment configuration (config vars) for an app or the global
//! table
//!
//! Current state comes from `config:export --format json`, which is the
//! one structured read in the CLI surface; everything else is plain
//! text. Only differing keys are set, and only declared-and-present
//! keys are unset.

use anyhow::Result;
use std::collections::BTreeMap;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::dokku::Dokku;

/// Config vars for one app, or for the global table when `app` is None.
#[derive(Debug, Clone)]
pub struct ConfigVars {
    pub app: Option<String>,
    pub vars: BTreeMap<String, String>,
    pub unset: Vec<String>,
    /// Whether setting vars may restart the app. Defaults to false,
    /// adding `--no-restart`.
    pub restart: bool,
}

impl ConfigVars {
    pub fn new(app: Option<&str>, vars: BTreeMap<String, String>) -> Self {
        Self {
            app: app.map(ToString::to_string),
            vars,
            unset: Vec::new(),
            restart: false,
        }
    }

    pub fn with_unset(mut self, unset: Vec<String>) -> Self {
        self.unset = unset;
        self
    }

    pub fn with_restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }

    fn target(&self) -> &str {
        self.app.as_deref().unwrap_or("--global")
    }

    /// Current vars via the JSON export. A malformed export is a parse
    /// error surfaced as-is.
    fn existing(&self, dokku: &Dokku) -> Result<BTreeMap<String, String>> {
        let cmd = dokku.cmd(["config:export", "--format", "json", self.target()]);
        let captured = dokku.run(&cmd)?;
        let vars = serde_json::from_str(captured.text())?;
        Ok(vars)
    }

    fn to_set(&self, existing: &BTreeMap<String, String>) -> Vec<(String, String)> {
        self.vars
            .iter()
            .filter(|(key, value)| existing.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn to_unset(&self, existing: &BTreeMap<String, String>) -> Vec<String> {
        self.unset
            .iter()
            .filter(|key| existing.contains_key(*key))
            .cloned()
            .collect()
    }

    fn set_command(&self, dokku: &Dokku, pairs: &[(String, String)]) -> reconcile::Cmd {
        let mut args = vec!["config:set".to_string()];
        if !self.restart {
            args.push("--no-restart".to_string());
        }
        args.push(self.target().to_string());
        args.extend(pairs.iter().map(|(key, value)| format!("{key}={value}")));
        dokku.cmd(args)
    }

    fn unset_command(&self, dokku: &Dokku, keys: &[String]) -> reconcile::Cmd {
        let mut args = vec!["config:unset".to_string()];
        if !self.restart {
            args.push("--no-restart".to_string());
        }
        args.push(self.target().to_string());
        args.extend(keys.iter().cloned());
        dokku.cmd(args)
    }
}

impl Resource for ConfigVars {
    fn id(&self) -> String {
        format!("config:{}", self.app.as_deref().unwrap_or("global"))
    }

    fn description(&self) -> String {
        format!(
            "Configure environment of {}",
            self.app.as_deref().unwrap_or("the global table")
        )
    }

    fn resource_type(&self) -> &'static str {
        "config"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        let existing = self.existing(dokku)?;
        let to_set = self.to_set(&existing);
        let to_unset = self.to_unset(&existing);

        if to_set.is_empty() && to_unset.is_empty() {
            return Ok(ResourceState::Present { details: None });
        }

        let mut from = Vec::new();
        let mut to = Vec::new();
        for (key, value) in &to_set {
            from.push(match existing.get(key) {
                Some(current) => format!("{key}={current}"),
                None => format!("{key} unset"),
            });
            to.push(format!("{key}={value}"));
        }
        for key in &to_unset {
            from.push(format!("{key} set"));
            to.push(format!("{key} unset"));
        }

        Ok(ResourceState::Modified {
            from: from.join(", "),
            to: to.join(", "),
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existing = self.existing(dokku)?;
        let to_set = self.to_set(&existing);
        let to_unset = self.to_unset(&existing);

        if to_set.is_empty() && to_unset.is_empty() {
            return Ok(ApplyResult::NoChange);
        }
        if let Some(skipped) = ctx.skip_if_dry_run() {
            return Ok(skipped);
        }

        let mut changed = Vec::new();

        if !to_set.is_empty() {
            if let Err(err) = dokku.run(&self.set_command(dokku, &to_set)) {
                return Ok(ApplyResult::Failed {
                    error: err.to_string(),
                });
            }
            changed.extend(to_set.into_iter().map(|(key, _)| key));
        }

        if !to_unset.is_empty() {
            if let Err(err) = dokku.run(&self.unset_command(dokku, &to_unset)) {
                return Ok(ApplyResult::Failed {
                    error: format!("{err} (changed before failure: {})", changed.join(", ")),
                });
            }
            changed.extend(to_unset);
        }

        Ok(ApplyResult::Modified { changed })
    }
}
