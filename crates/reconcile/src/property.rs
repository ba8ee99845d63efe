//! Generic property reconciliation over a `report`/`set` command family.
//!
//! Several resource kinds share the exact same shape: a read-only
//! `<prefix>:report` subcommand printing `key: value` lines, and a
//! `<prefix>:set <target> <key> [value]` subcommand to change one key
//! (no value meaning "reset to default"). [`PropertyDomain`] captures
//! that shape once, parameterized by command prefix, allowed keys,
//! settable keys and key-prefix-to-strip.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::report::{parse_report, Report, ReportSpec};
use crate::runner::{Cmd, CommandRunner, RunError};

/// What a property family operates on: one named resource, or the
/// tool-wide global table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    App(String),
    Global,
}

impl Scope {
    /// The positional argument the CLI expects for this scope.
    pub fn argument(&self) -> &str {
        match self {
            Self::App(name) => name,
            Self::Global => "--global",
        }
    }
}

/// Result of a multi-key set pass.
///
/// Partial success is expected: some keys may have been written before a
/// later one failed, so callers must inspect both `error` and
/// `changed_keys`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOutcome {
    pub changed: bool,
    pub changed_keys: Vec<String>,
    /// All failures joined with `,`; `None` when every set succeeded.
    pub error: Option<String>,
}

impl SetOutcome {
    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    fn record(&mut self, key: &str, result: Result<(), RunError>) {
        match result {
            Ok(()) => {
                self.changed = true;
                self.changed_keys.push(key.to_string());
            }
            Err(err) => {
                let message = err.to_string();
                self.error = Some(match self.error.take() {
                    Some(existing) => format!("{existing},{message}"),
                    None => message,
                });
            }
        }
    }
}

/// Strategy object describing one `<prefix>:report` / `<prefix>:set`
/// command family.
#[derive(Debug, Clone)]
pub struct PropertyDomain {
    program: String,
    command_prefix: String,
    spec: ReportSpec,
    settable_keys: Vec<String>,
}

impl PropertyDomain {
    pub fn new(
        program: impl Into<String>,
        command_prefix: impl Into<String>,
        spec: ReportSpec,
        settable_keys: &[&str],
    ) -> Self {
        Self {
            program: program.into(),
            command_prefix: command_prefix.into(),
            spec,
            settable_keys: settable_keys.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn settable_keys(&self) -> &[String] {
        &self.settable_keys
    }

    fn report_cmd(&self, scope: &Scope) -> Cmd {
        Cmd::new(&self.program)
            .arg("--quiet")
            .arg(format!("{}:report", self.command_prefix))
            .arg(scope.argument())
    }

    fn set_cmd(&self, scope: &Scope, key: &str, value: Option<&str>) -> Cmd {
        let cmd = Cmd::new(&self.program)
            .arg("--quiet")
            .arg(format!("{}:set", self.command_prefix))
            .arg(scope.argument())
            .arg(key);
        match value {
            Some(value) => cmd.arg(value),
            None => cmd,
        }
    }

    /// Fetch and parse the current report. Never cached: truth is
    /// re-derived from the external system on every call.
    pub fn fetch_report(
        &self,
        runner: &dyn CommandRunner,
        scope: &Scope,
    ) -> Result<Report, RunError> {
        let captured = runner.run(&self.report_cmd(scope))?;
        Ok(parse_report(&captured.lines(), &self.spec))
    }

    /// Set every settable key that is present in both `desired` and
    /// `current` but differs, one command per key. Keys absent from
    /// `desired` are left untouched.
    pub fn set_values(
        &self,
        runner: &dyn CommandRunner,
        scope: &Scope,
        desired: &BTreeMap<String, String>,
        current: &Report,
    ) -> SetOutcome {
        let mut outcome = SetOutcome::default();

        for (key, value) in current {
            if !self.settable_keys.contains(key) {
                continue;
            }
            let Some(wanted) = desired.get(key) else {
                continue;
            };
            if wanted == &value.canonical() {
                continue;
            }

            let result = runner.run_ok(&self.set_cmd(scope, key, Some(wanted)));
            outcome.record(key, result);
        }

        outcome
    }

    /// Unset every settable key unconditionally. Used when a feature is
    /// being disabled outright and its whole configuration should reset.
    pub fn set_blank(&self, runner: &dyn CommandRunner, scope: &Scope) -> SetOutcome {
        let mut outcome = SetOutcome::default();

        for key in &self.settable_keys {
            let result = runner.run_ok(&self.set_cmd(scope, key, None));
            outcome.record(key, result);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScriptedRunner;

    fn builder_domain() -> PropertyDomain {
        PropertyDomain::new(
            "dokku",
            "builder",
            ReportSpec::new("builder-", &["build-dir", "selected"]),
            &["build-dir", "selected"],
        )
    }

    fn desired(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn fetch_report_parses_current_state() {
        let runner = ScriptedRunner::new().ok(
            "dokku --quiet builder:report hello-world",
            "=====> hello-world builder information\n       Builder build dir:        app\n       Builder selected:         herokuish\n",
        );
        let domain = builder_domain();

        let report = domain
            .fetch_report(&runner, &Scope::App("hello-world".to_string()))
            .unwrap();

        assert_eq!(report.get("build-dir").unwrap().canonical(), "app");
        assert_eq!(report.get("selected").unwrap().canonical(), "herokuish");
    }

    #[test]
    fn sets_only_the_differing_key() {
        let runner = ScriptedRunner::new()
            .ok(
                "dokku --quiet builder:report hello-world",
                "Builder build dir:        app\nBuilder selected:         herokuish",
            )
            .ok("dokku --quiet builder:set hello-world selected dockerfile", "");
        let domain = builder_domain();
        let scope = Scope::App("hello-world".to_string());

        let current = domain.fetch_report(&runner, &scope).unwrap();
        let outcome = domain.set_values(&runner, &scope, &desired(&[("selected", "dockerfile")]), &current);

        assert!(outcome.changed);
        assert_eq!(outcome.changed_keys, vec!["selected"]);
        assert!(outcome.error.is_none());

        let sets: Vec<_> = runner
            .calls()
            .into_iter()
            .filter(|call| call.contains(":set"))
            .collect();
        assert_eq!(sets, vec!["dokku --quiet builder:set hello-world selected dockerfile"]);
    }

    #[test]
    fn matching_values_issue_no_commands() {
        let runner = ScriptedRunner::new();
        let domain = builder_domain();
        let scope = Scope::App("hello-world".to_string());

        let mut current = Report::new();
        current.insert(
            "selected".to_string(),
            crate::report::ReportValue::Text("dockerfile".to_string()),
        );

        let outcome = domain.set_values(&runner, &scope, &desired(&[("selected", "dockerfile")]), &current);

        assert!(!outcome.changed);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn partial_failure_reports_both_sides() {
        let runner = ScriptedRunner::new()
            .fail(
                "dokku --quiet builder:set hello-world build-dir backend",
                "some plugin exploded",
            )
            .ok("dokku --quiet builder:set hello-world selected dockerfile", "");
        let domain = builder_domain();
        let scope = Scope::App("hello-world".to_string());

        let mut current = Report::new();
        current.insert(
            "build-dir".to_string(),
            crate::report::ReportValue::Text("app".to_string()),
        );
        current.insert(
            "selected".to_string(),
            crate::report::ReportValue::Text("herokuish".to_string()),
        );

        let outcome = domain.set_values(
            &runner,
            &scope,
            &desired(&[("build-dir", "backend"), ("selected", "dockerfile")]),
            &current,
        );

        assert!(outcome.changed);
        assert_eq!(outcome.changed_keys, vec!["selected"]);
        let error = outcome.error.expect("first key failed");
        assert!(error.contains("build-dir"), "error should name the failed key: {error}");
    }

    #[test]
    fn set_blank_unsets_every_settable_key() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet builder:set hello-world build-dir", "")
            .ok("dokku --quiet builder:set hello-world selected", "");
        let domain = builder_domain();

        let outcome = domain.set_blank(&runner, &Scope::App("hello-world".to_string()));

        assert!(outcome.changed);
        assert_eq!(outcome.changed_keys, vec!["build-dir", "selected"]);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn global_scope_uses_the_global_flag() {
        let runner = ScriptedRunner::new().ok("dokku --quiet builder:report --global", "Builder selected: herokuish");
        let domain = builder_domain();

        let report = domain.fetch_report(&runner, &Scope::Global).unwrap();
        assert_eq!(report.get("selected").unwrap().canonical(), "herokuish");
    }
}
