//! Port mappings (`scheme:host-port:container-port`)
//!
//! The subcommand family moved from `proxy:ports*` to `ports:*` in
//! dokku 0.31; the right family is picked by probing `dokku --version`
//! once. Report lines are column-aligned triples normalized back to
//! colon form before diffing.

use anyhow::Result;
use serde::Deserialize;

use super::{ApplyContext, ApplyResult, Resource, ResourceState};
use crate::dokku::Dokku;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    #[default]
    Present,
    Absent,
    Clear,
}

/// Port mappings for one app
#[derive(Debug, Clone)]
pub struct Ports {
    pub app: String,
    pub mappings: Vec<String>,
    pub state: PortState,
}

/// The two generations of the port-management CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortFamily {
    /// dokku >= 0.31
    Ports,
    /// `proxy:ports*` on older hosts
    LegacyProxy,
}

impl PortFamily {
    fn detect(dokku: &Dokku) -> Result<Self> {
        let version = dokku.version()?;
        if version.at_least(0, 31) {
            Ok(Self::Ports)
        } else {
            Ok(Self::LegacyProxy)
        }
    }

    fn list(self) -> &'static str {
        match self {
            Self::Ports => "ports:list",
            Self::LegacyProxy => "proxy:ports",
        }
    }

    fn add(self) -> &'static str {
        match self {
            Self::Ports => "ports:add",
            Self::LegacyProxy => "proxy:ports-add",
        }
    }

    fn remove(self) -> &'static str {
        match self {
            Self::Ports => "ports:remove",
            Self::LegacyProxy => "proxy:ports-remove",
        }
    }

    fn clear(self) -> &'static str {
        match self {
            Self::Ports => "ports:clear",
            Self::LegacyProxy => "proxy:ports-clear",
        }
    }
}

impl Ports {
    pub fn new(app: &str, mappings: Vec<String>, state: PortState) -> Self {
        Self {
            app: app.to_string(),
            mappings,
            state,
        }
    }

    /// Current mappings, normalized from aligned columns to
    /// `scheme:host:container`.
    fn existing(&self, dokku: &Dokku) -> Result<Vec<String>> {
        let family = PortFamily::detect(dokku)?;
        let lines = dokku.run_lines(&dokku.quiet([family.list(), self.app.as_str()]))?;
        Ok(lines
            .iter()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(":"))
            .filter(|mapping| mapping.contains(':'))
            .collect())
    }

    fn to_add(&self, existing: &[String]) -> Vec<String> {
        self.mappings
            .iter()
            .filter(|mapping| !existing.contains(*mapping))
            .cloned()
            .collect()
    }

    fn to_remove(&self, existing: &[String]) -> Vec<String> {
        self.mappings
            .iter()
            .filter(|mapping| existing.contains(*mapping))
            .cloned()
            .collect()
    }

    fn run_family(
        &self,
        dokku: &Dokku,
        subcommand: &str,
        mappings: &[String],
    ) -> Result<ApplyResult> {
        let mut args = vec![subcommand.to_string(), self.app.clone()];
        args.extend(mappings.iter().cloned());
        match dokku.run(&dokku.quiet(args)) {
            Ok(_) => Ok(ApplyResult::Modified {
                changed: mappings.to_vec(),
            }),
            Err(err) => Ok(ApplyResult::Failed {
                error: err.to_string(),
            }),
        }
    }
}

impl Resource for Ports {
    fn id(&self) -> String {
        format!("ports:{}", self.app)
    }

    fn description(&self) -> String {
        match self.state {
            PortState::Present => format!("Add port mappings to {}", self.app),
            PortState::Absent => format!("Remove port mappings from {}", self.app),
            PortState::Clear => format!("Clear port mappings of {}", self.app),
        }
    }

    fn resource_type(&self) -> &'static str {
        "ports"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        let existing = self.existing(dokku)?;

        let state = match self.state {
            PortState::Present => {
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
            PortState::Absent => {
                let present = self.to_remove(&existing);
                if present.is_empty() {
                    ResourceState::Absent
                } else {
                    ResourceState::present(present.join(", "))
                }
            }
            PortState::Clear => {
                if existing.is_empty() {
                    ResourceState::Absent
                } else {
                    ResourceState::present(existing.join(", "))
                }
            }
        };

        Ok(state)
    }

    fn desired_state(&self) -> ResourceState {
        match self.state {
            PortState::Present => ResourceState::Present { details: None },
            PortState::Absent | PortState::Clear => ResourceState::Absent,
        }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let family = PortFamily::detect(dokku)?;
        let existing = self.existing(dokku)?;

        match self.state {
            PortState::Present => {
                let to_add = self.to_add(&existing);
                if to_add.is_empty() {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.run_family(dokku, family.add(), &to_add)
            }
            PortState::Absent => {
                let to_remove = self.to_remove(&existing);
                if to_remove.is_empty() {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.run_family(dokku, family.remove(), &to_remove)
            }
            PortState::Clear => {
                if existing.is_empty() {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                self.run_family(dokku, family.clear(), &[])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::ScriptedRunner;

    fn mappings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn normalizes_column_aligned_listing() {
        let runner = ScriptedRunner::new()
            .ok("dokku --version", "dokku version 0.31.4")
            .ok("dokku --quiet ports:list api", "http    80    5000\nhttps   443   5000");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let ports = Ports::new("api", mappings(&["http:80:5000"]), PortState::Present);

        let existing = ports.existing(&dokku).unwrap();
        assert_eq!(existing, mappings(&["http:80:5000", "https:443:5000"]));
    }

    #[test]
    fn modern_host_uses_ports_family() {
        let runner = ScriptedRunner::new()
            .ok("dokku --version", "dokku version 0.31.4")
            .ok("dokku --quiet ports:list api", "http    80    5000")
            .ok("dokku --quiet ports:add api https:443:5000", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let ports = Ports::new(
            "api",
            mappings(&["http:80:5000", "https:443:5000"]),
            PortState::Present,
        );

        let mut ctx = ApplyContext::default();
        let result = ports.apply(&dokku, &mut ctx).unwrap();
        assert_eq!(
            result,
            ApplyResult::Modified {
                changed: mappings(&["https:443:5000"])
            }
        );
    }

    #[test]
    fn legacy_host_uses_proxy_ports_family() {
        let runner = ScriptedRunner::new()
            .ok("dokku --version", "dokku version 0.30.9")
            .ok("dokku --quiet proxy:ports api", "http    80    5000")
            .ok("dokku --quiet proxy:ports-remove api http:80:5000", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let ports = Ports::new("api", mappings(&["http:80:5000"]), PortState::Absent);

        let mut ctx = ApplyContext::default();
        assert!(ports.apply(&dokku, &mut ctx).unwrap().is_change());
    }

    #[test]
    fn present_with_all_mappings_is_noop() {
        let runner = ScriptedRunner::new()
            .ok("dokku --version", "dokku version 0.31.4")
            .ok("dokku --quiet ports:list api", "http    80    5000");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let ports = Ports::new("api", mappings(&["http:80:5000"]), PortState::Present);

        let mut ctx = ApplyContext::default();
        assert_eq!(ports.apply(&dokku, &mut ctx).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn clear_on_empty_listing_is_noop() {
        let runner = ScriptedRunner::new()
            .ok("dokku --version", "dokku version 0.31.4")
            .ok("dokku --quiet ports:list api", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let ports = Ports::new("api", Vec::new(), PortState::Clear);

        let mut ctx = ApplyContext::default();
        assert_eq!(ports.apply(&dokku, &mut ctx).unwrap(), ApplyResult::NoChange);
    }
}
