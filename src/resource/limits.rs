//! Resource limits and reservations per app (optionally per process
//! type)
//!
//! `resource:limit` and `resource:reserve` share one report format and
//! one flag-style set command, so both kinds run through the same
//! resource with a kind selector.

use anyhow::Result;
use std::collections::BTreeMap;

use reconcile::{parse_report, Report, ReportSpec};

use super::{ApplyContext, ApplyResult, Ensure, Resource, ResourceState};
use crate::dokku::Dokku;

/// Resource keys dokku accepts for limits and reservations.
pub const ALLOWED_RESOURCES: &[&str] = &[
    "cpu",
    "memory",
    "memory-swap",
    "network",
    "network-ingress",
    "network-egress",
    "nvidia-gpu",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Limit,
    Reserve,
}

impl BoundKind {
    fn subcommand(self) -> &'static str {
        match self {
            Self::Limit => "resource:limit",
            Self::Reserve => "resource:reserve",
        }
    }

    fn clear_subcommand(self) -> &'static str {
        match self {
            Self::Limit => "resource:limit-clear",
            Self::Reserve => "resource:reserve-clear",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            Self::Limit => "limits",
            Self::Reserve => "reservations",
        }
    }
}

/// Declared bounds of one kind for one app
#[derive(Debug, Clone)]
pub struct ResourceBounds {
    pub app: String,
    pub kind: BoundKind,
    pub resources: BTreeMap<String, String>,
    pub process_type: Option<String>,
    /// Wipe existing bounds before setting the declared ones.
    pub clear_before: bool,
    pub ensure: Ensure,
}

impl ResourceBounds {
    fn report_cmd(&self, dokku: &Dokku) -> reconcile::Cmd {
        let mut args = vec![self.kind.subcommand().to_string()];
        if let Some(process_type) = &self.process_type {
            args.push("--process-type".to_string());
            args.push(process_type.clone());
        }
        args.push(self.app.clone());
        dokku.quiet(args)
    }

    fn fetch(&self, dokku: &Dokku) -> Result<Report> {
        let lines = dokku.run_lines(&self.report_cmd(dokku))?;
        Ok(parse_report(&lines, &ReportSpec::new("", ALLOWED_RESOURCES)))
    }

    /// Declared keys whose reported value differs (or is missing).
    fn differing(&self, report: &Report) -> Vec<String> {
        self.resources
            .iter()
            .filter(|(key, value)| {
                report.get(*key).map(reconcile::ReportValue::canonical) != Some((*value).clone())
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn clear(&self, dokku: &Dokku) -> Result<(), reconcile::RunError> {
        let mut args = vec![self.kind.clear_subcommand().to_string()];
        if let Some(process_type) = &self.process_type {
            args.push("--process-type".to_string());
            args.push(process_type.clone());
        }
        args.push(self.app.clone());
        dokku.run(&dokku.cmd(args)).map(|_| ())
    }

    fn set_all(&self, dokku: &Dokku) -> Result<(), reconcile::RunError> {
        let mut args = vec![self.kind.subcommand().to_string()];
        for (key, value) in &self.resources {
            args.push(format!("--{key}"));
            args.push(value.clone());
        }
        if let Some(process_type) = &self.process_type {
            args.push("--process-type".to_string());
            args.push(process_type.clone());
        }
        args.push(self.app.clone());
        dokku.run(&dokku.cmd(args)).map(|_| ())
    }
}

impl Resource for ResourceBounds {
    fn id(&self) -> String {
        match &self.process_type {
            Some(process_type) => format!("resource-{}:{}:{process_type}", self.kind.noun(), self.app),
            None => format!("resource-{}:{}", self.kind.noun(), self.app),
        }
    }

    fn description(&self) -> String {
        match self.ensure {
            Ensure::Present => format!("Set resource {} for {}", self.kind.noun(), self.app),
            Ensure::Absent => format!("Clear resource {} for {}", self.kind.noun(), self.app),
        }
    }

    fn resource_type(&self) -> &'static str {
        match self.kind {
            BoundKind::Limit => "resource-limits",
            BoundKind::Reserve => "resource-reservations",
        }
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        match self.ensure {
            Ensure::Present => {
                let report = self.fetch(dokku)?;
                let differing = self.differing(&report);
                if differing.is_empty() && !self.clear_before {
                    Ok(ResourceState::Present { details: None })
                } else {
                    let from = differing
                        .iter()
                        .map(|key| {
                            let current = report
                                .get(key)
                                .map(reconcile::ReportValue::canonical)
                                .unwrap_or_default();
                            format!("{key}={current}")
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    let to = differing
                        .iter()
                        .map(|key| {
                            format!("{key}={}", self.resources.get(key).cloned().unwrap_or_default())
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    Ok(ResourceState::Modified { from, to })
                }
            }
            // Clearing always runs; the CLI has no read that
            // distinguishes "cleared" from "never set".
            Ensure::Absent => Ok(ResourceState::Unknown),
        }
    }

    fn desired_state(&self) -> ResourceState {
        match self.ensure {
            Ensure::Present => ResourceState::Present { details: None },
            Ensure::Absent => ResourceState::Absent,
        }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        match self.ensure {
            Ensure::Present => {
                let report = self.fetch(dokku)?;
                let differing = self.differing(&report);
                if differing.is_empty() && !self.clear_before {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }

                if self.clear_before {
                    if let Err(err) = self.clear(dokku) {
                        return Ok(ApplyResult::Failed {
                            error: err.to_string(),
                        });
                    }
                }
                if let Err(err) = self.set_all(dokku) {
                    return Ok(ApplyResult::Failed {
                        error: err.to_string(),
                    });
                }
                Ok(ApplyResult::Modified { changed: differing })
            }
            Ensure::Absent => {
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                match self.clear(dokku) {
                    Ok(()) => Ok(ApplyResult::Removed),
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

    fn resources(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn bounds(kind: BoundKind, declared: &[(&str, &str)]) -> ResourceBounds {
        ResourceBounds {
            app: "api".to_string(),
            kind,
            resources: resources(declared),
            process_type: None,
            clear_before: false,
            ensure: Ensure::Present,
        }
    }

    const REPORT: &str = "  cpu:             2\n  memory:          512\n  memory-swap:     \n  network:         \n  network-ingress: \n  network-egress:  \n  nvidia-gpu:      ";

    #[test]
    fn matching_limits_are_noop() {
        let runner = ScriptedRunner::new().ok("dokku --quiet resource:limit api", REPORT);
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let bounds = bounds(BoundKind::Limit, &[("cpu", "2"), ("memory", "512")]);

        let mut ctx = ApplyContext::default();
        assert_eq!(bounds.apply(&dokku, &mut ctx).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn differing_limit_reissues_all_declared_flags() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet resource:limit api", REPORT)
            .ok("dokku resource:limit --cpu 2 --memory 1024 api", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let bounds = bounds(BoundKind::Limit, &[("cpu", "2"), ("memory", "1024")]);

        let mut ctx = ApplyContext::default();
        let result = bounds.apply(&dokku, &mut ctx).unwrap();
        assert_eq!(
            result,
            ApplyResult::Modified {
                changed: vec!["memory".to_string()]
            }
        );
    }

    #[test]
    fn process_type_scopes_report_and_set() {
        let runner = ScriptedRunner::new()
            .ok(
                "dokku --quiet resource:reserve --process-type web api",
                "  memory:          ",
            )
            .ok(
                "dokku resource:reserve --memory 256 --process-type web api",
                "",
            );
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let mut bounds = bounds(BoundKind::Reserve, &[("memory", "256")]);
        bounds.process_type = Some("web".to_string());

        let mut ctx = ApplyContext::default();
        assert!(bounds.apply(&dokku, &mut ctx).unwrap().is_change());
    }

    #[test]
    fn clear_before_wipes_then_sets() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet resource:limit api", REPORT)
            .ok("dokku resource:limit-clear api", "")
            .ok("dokku resource:limit --cpu 2 --memory 512 api", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let mut bounds = bounds(BoundKind::Limit, &[("cpu", "2"), ("memory", "512")]);
        bounds.clear_before = true;

        let mut ctx = ApplyContext::default();
        assert!(bounds.apply(&dokku, &mut ctx).unwrap().is_change());
    }

    #[test]
    fn absent_always_clears() {
        let runner = ScriptedRunner::new().ok("dokku resource:limit-clear api", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let mut bounds = bounds(BoundKind::Limit, &[]);
        bounds.ensure = Ensure::Absent;

        let mut ctx = ApplyContext::default();
        assert_eq!(bounds.apply(&dokku, &mut ctx).unwrap(), ApplyResult::Removed);
    }
}
