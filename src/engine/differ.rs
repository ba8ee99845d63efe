//! Diff computation and display

use colored::Colorize;
use std::collections::BTreeMap;

use crate::dokku::Dokku;
use crate::resource::{Resource, ResourceDiff, ResourceState};

/// Compute diffs for all resources. Resources whose current state
/// cannot be read (e.g. sub-resources of an app that does not exist
/// yet) are left out of the diff; applying will create the app first
/// and surface any real failure then.
pub fn compute_diffs(resources: &[Box<dyn Resource>], dokku: &Dokku) -> Vec<ResourceDiff> {
    resources
        .iter()
        .filter_map(|resource| {
            ResourceDiff::from_resource(resource.as_ref(), dokku)
                .map_err(|err| {
                    log::debug!("could not read state of {}: {err:#}", resource.id());
                    err
                })
                .ok()
                .flatten()
        })
        .collect()
}

fn type_name(resource_type: &str) -> &str {
    match resource_type {
        "app" => "Applications",
        "domains" => "Domains",
        "config" => "Config vars",
        "ports" => "Port mappings",
        "docker-options" => "Docker options",
        "builder" => "Builder",
        "storage" => "Storage mounts",
        "resource-limits" => "Resource limits",
        "resource-reservations" => "Resource reservations",
        "proxy" => "Proxy",
        "checks" => "Deployment checks",
        "global-cert" => "TLS certificate (host-wide)",
        "http-auth" => "HTTP auth",
        "lets-encrypt" => "Let's Encrypt",
        "service" => "Services",
        "service-link" => "Service links",
        "network" => "Networks",
        "network-property" => "Network attachments",
        "registry" => "Registry",
        "ecr" => "ECR",
        "git-sync" => "Git sync",
        "ps-scale" => "Process scale",
        "buildpacks" => "Buildpacks",
        "acl" => "Access control",
        "git" => "Deployments",
        other => other,
    }
}

/// Display a list of diffs in a user-friendly format
pub fn display_diff(diffs: &[ResourceDiff]) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    // Group by resource type
    let mut by_type: BTreeMap<&str, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        by_type.entry(diff.resource_type.as_str()).or_default().push(diff);
    }

    println!();
    println!("┌─ {} ─────────────────────────────────────────┐", "Host Diff".bold());
    println!("│");

    for (resource_type, type_diffs) in &by_type {
        println!("│ {}", type_name(resource_type).bold());

        for diff in type_diffs {
            let symbol = match (&diff.current, &diff.desired) {
                (ResourceState::Absent, ResourceState::Present { .. }) => "+".green(),
                (ResourceState::Present { .. }, ResourceState::Absent) => "-".red(),
                _ => "~".yellow(),
            };

            let state_desc = match (&diff.current, &diff.desired) {
                (ResourceState::Absent, ResourceState::Present { details }) => details
                    .as_ref()
                    .map(|d| format!("→ {d}"))
                    .unwrap_or_else(|| "(missing)".to_string()),
                (ResourceState::Present { details }, ResourceState::Absent) => details
                    .as_ref()
                    .map(|d| format!("{d} (will remove)"))
                    .unwrap_or_else(|| "(will remove)".to_string()),
                (ResourceState::Modified { from, to }, _) => format!("{from} → {to}"),
                (ResourceState::Unknown, ResourceState::Present { details }) => details
                    .as_ref()
                    .map(|d| format!("→ {d}"))
                    .unwrap_or_else(|| "(will apply)".to_string()),
                _ => String::new(),
            };

            let detail = if state_desc.is_empty() {
                diff.description.clone()
            } else {
                state_desc
            };
            println!("│   {} {:<32} {}", symbol, diff.resource_id, detail.dimmed());
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!("│ Summary: {} changes", diffs.len().to_string().bold());
    println!("└─────────────────────────────────────────────────────┘");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::app::App;
    use crate::resource::domains::{DomainState, Domains};
    use crate::resource::Ensure;
    use reconcile::ScriptedRunner;

    #[test]
    fn converged_resources_produce_no_diffs() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet apps:exists api", "")
            .ok("dokku --quiet domains api", "api.example.com");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));

        let resources: Vec<Box<dyn Resource>> = vec![
            Box::new(App::new("api", Ensure::Present)),
            Box::new(Domains::new(
                "api",
                vec!["api.example.com".to_string()],
                DomainState::Present,
            )),
        ];

        assert!(compute_diffs(&resources, &dokku).is_empty());
    }

    #[test]
    fn unreadable_state_is_dropped_from_the_diff() {
        // domains read fails while the app read succeeds
        let runner = ScriptedRunner::new()
            .fail("dokku --quiet apps:exists api", "does not exist")
            .fail("dokku --quiet domains api", "App api does not exist");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));

        let resources: Vec<Box<dyn Resource>> = vec![
            Box::new(App::new("api", Ensure::Present)),
            Box::new(Domains::new(
                "api",
                vec!["api.example.com".to_string()],
                DomainState::Present,
            )),
        ];

        let diffs = compute_diffs(&resources, &dokku);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].resource_id, "app:api");
    }
}
