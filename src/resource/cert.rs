//! Host-wide TLS certificate (`global-cert`)

use anyhow::Result;
use reconcile::{parse_report, Report, ReportSpec, ReportValue};

use super::{ApplyContext, ApplyResult, Ensure, Resource, ResourceState};
use crate::dokku::Dokku;

const ALLOWED_KEYS: &[&str] = &[
    "dir",
    "enabled",
    "hostnames",
    "expires-at",
    "issuer",
    "starts-at",
    "subject",
    "verified",
];

/// The host-wide certificate/key pair
#[derive(Debug, Clone)]
pub struct GlobalCert {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    pub ensure: Ensure,
}

impl GlobalCert {
    fn fetch(&self, dokku: &Dokku) -> Result<Report> {
        let lines = dokku.run_lines(&dokku.quiet(["global-cert:report"]))?;
        let spec = ReportSpec::new("global-cert-", ALLOWED_KEYS).bool_key("enabled");
        Ok(parse_report(&lines, &spec))
    }

    fn enabled(report: &Report) -> bool {
        report
            .get("enabled")
            .and_then(ReportValue::as_flag)
            .unwrap_or(false)
    }
}

impl Resource for GlobalCert {
    fn id(&self) -> String {
        "global-cert".to_string()
    }

    fn description(&self) -> String {
        match self.ensure {
            Ensure::Present => "Install the host-wide TLS certificate".to_string(),
            Ensure::Absent => "Remove the host-wide TLS certificate".to_string(),
        }
    }

    fn resource_type(&self) -> &'static str {
        "global-cert"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        let report = self.fetch(dokku)?;
        if Self::enabled(&report) {
            Ok(ResourceState::Present { details: None })
        } else {
            Ok(ResourceState::Absent)
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
        let enabled = Self::enabled(&report);

        match self.ensure {
            Ensure::Present => {
                if enabled {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                let (Some(cert), Some(key)) = (&self.cert_path, &self.key_path) else {
                    return Ok(ApplyResult::Failed {
                        error: "missing required arguments: cert, key".to_string(),
                    });
                };
                match dokku.run(&dokku.quiet(["global-cert:set", cert.as_str(), key.as_str()])) {
                    Ok(_) => Ok(ApplyResult::Created),
                    Err(err) => Ok(ApplyResult::Failed {
                        error: err.to_string(),
                    }),
                }
            }
            Ensure::Absent => {
                if !enabled {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }
                match dokku.run(&dokku.quiet(["global-cert:remove"])) {
                    Ok(_) => Ok(ApplyResult::Removed),
                    Err(err) => Ok(ApplyResult::Failed {
                        error: err.to_string(),
                    }),
                }
            }
        }
    }
}
