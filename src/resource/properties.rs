//! Generic property-backed resource.
//!
//! Builder, registry, ECR and git-sync configuration all share the same
//! CLI surface: a `<prefix>:report` subcommand and a per-key
//! `<prefix>:set`. This resource wraps [`reconcile::PropertyDomain`]
//! once; the per-kind modules are thin instantiations.

use anyhow::Result;
use reconcile::{PropertyDomain, Report, ReportSpec, Scope};
use std::collections::BTreeMap;

use super::{ApplyContext, ApplyResult, Ensure, Resource, ResourceState};
use crate::dokku::Dokku;

/// One property family (e.g. `registry:*`) scoped to an app or the
/// global table, with the desired key/value pairs from the manifest.
#[derive(Debug, Clone)]
pub struct PropertyResource {
    kind: &'static str,
    scope: Scope,
    command_prefix: &'static str,
    report_spec: ReportSpec,
    settable_keys: Vec<&'static str>,
    desired: BTreeMap<String, String>,
    /// Whether the report carries an `enabled` flag that `ensure:
    /// absent` keys off (registry, ECR). Families without the flag
    /// (builder) only support `present`.
    track_enabled: bool,
    ensure: Ensure,
}

impl PropertyResource {
    pub fn new(
        kind: &'static str,
        scope: Scope,
        command_prefix: &'static str,
        report_spec: ReportSpec,
        settable_keys: &[&'static str],
        desired: BTreeMap<String, String>,
        track_enabled: bool,
        ensure: Ensure,
    ) -> Self {
        Self {
            kind,
            scope,
            command_prefix,
            report_spec,
            settable_keys: settable_keys.to_vec(),
            desired,
            track_enabled,
            ensure,
        }
    }

    fn domain(&self, dokku: &Dokku) -> PropertyDomain {
        dokku.property_domain(
            self.command_prefix,
            self.report_spec.clone(),
            &self.settable_keys,
        )
    }

    fn fetch(&self, dokku: &Dokku) -> Result<Report> {
        log::debug!("fetching {} report for {}", self.kind, self.scope.argument());
        Ok(self.domain(dokku).fetch_report(dokku.runner(), &self.scope)?)
    }

    fn enabled(report: &Report) -> bool {
        report
            .get("enabled")
            .and_then(reconcile::ReportValue::as_flag)
            .unwrap_or(false)
    }

    /// Keys that would be written: settable, desired, and differing.
    fn differing_keys(&self, report: &Report) -> Vec<String> {
        report
            .iter()
            .filter(|(key, value)| {
                self.settable_keys.iter().any(|k| *k == key.as_str())
                    && self
                        .desired
                        .get(*key)
                        .is_some_and(|wanted| wanted != &value.canonical())
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn summarize(&self, report: &Report, keys: &[String]) -> (String, String) {
        let from = keys
            .iter()
            .map(|key| {
                let current = report.get(key).map(reconcile::ReportValue::canonical);
                format!("{key}={}", current.unwrap_or_default())
            })
            .collect::<Vec<_>>()
            .join(", ");
        let to = keys
            .iter()
            .map(|key| {
                let wanted = self.desired.get(key).cloned().unwrap_or_default();
                format!("{key}={wanted}")
            })
            .collect::<Vec<_>>()
            .join(", ");
        (from, to)
    }
}

impl Resource for PropertyResource {
    fn id(&self) -> String {
        format!("{}:{}", self.kind, self.scope.argument())
    }

    fn description(&self) -> String {
        match self.ensure {
            Ensure::Present => format!(
                "Configure {} properties for {}",
                self.kind,
                self.scope.argument()
            ),
            Ensure::Absent => format!(
                "Reset {} configuration for {}",
                self.kind,
                self.scope.argument()
            ),
        }
    }

    fn resource_type(&self) -> &'static str {
        self.kind
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        let report = self.fetch(dokku)?;

        match self.ensure {
            Ensure::Absent => {
                if self.track_enabled && !Self::enabled(&report) {
                    Ok(ResourceState::Absent)
                } else {
                    Ok(ResourceState::Present { details: None })
                }
            }
            Ensure::Present => {
                let differing = self.differing_keys(&report);
                if differing.is_empty() {
                    Ok(ResourceState::Present { details: None })
                } else {
                    let (from, to) = self.summarize(&report, &differing);
                    Ok(ResourceState::Modified { from, to })
                }
            }
        }
    }

    fn desired_state(&self) -> ResourceState {
        match self.ensure {
            Ensure::Present => ResourceState::Present { details: None },
            Ensure::Absent => ResourceState::Absent,
        }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let report = self.fetch(dokku)?;
        let domain = self.domain(dokku);

        match self.ensure {
            Ensure::Present => {
                if self.differing_keys(&report).is_empty() {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }

                let outcome =
                    domain.set_values(dokku.runner(), &self.scope, &self.desired, &report);
                if let Some(error) = outcome.error {
                    return Ok(ApplyResult::Failed {
                        error: failed_message(&error, &outcome.changed_keys),
                    });
                }
                Ok(ApplyResult::Modified {
                    changed: outcome.changed_keys,
                })
            }
            Ensure::Absent => {
                if self.track_enabled && !Self::enabled(&report) {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }

                let outcome = domain.set_blank(dokku.runner(), &self.scope);
                if let Some(error) = outcome.error {
                    return Ok(ApplyResult::Failed {
                        error: failed_message(&error, &outcome.changed_keys),
                    });
                }
                Ok(ApplyResult::Removed)
            }
        }
    }
}

/// Partial success still names what did change.
fn failed_message(error: &str, changed_keys: &[String]) -> String {
    if changed_keys.is_empty() {
        error.to_string()
    } else {
        format!("{error} (changed before failure: {})", changed_keys.join(", "))
    }
}
