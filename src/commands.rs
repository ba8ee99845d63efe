//! Top-level command implementations

use anyhow::{bail, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::cli::{ApplyArgs, ManifestArgs, TargetArgs};
use crate::dokku::Dokku;
use crate::engine::{compute_diffs, display_diff, execute, filter_plan, plan, ExecuteOptions};
use crate::manifest::Manifest;

fn manifest_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(Manifest::default_path)
}

/// `dokkctl apply`
pub fn apply(dokku_bin: &str, args: ApplyArgs) -> Result<()> {
    let manifest = Manifest::load(&manifest_path(args.manifest))?;
    let dokku = Dokku::new(dokku_bin);
    let resources = filter_plan(plan(&manifest), args.target.as_deref());

    let summary = execute(
        &dokku,
        &resources,
        &ExecuteOptions {
            dry_run: args.dry_run,
            yes: args.yes,
            verbose: log::log_enabled!(log::Level::Info),
        },
    )?;

    if !summary.is_success() {
        bail!("{} resources failed to apply", summary.failed);
    }
    Ok(())
}

/// `dokkctl diff`
pub fn diff(dokku_bin: &str, args: TargetArgs) -> Result<()> {
    let manifest = Manifest::load(&manifest_path(args.manifest))?;
    let dokku = Dokku::new(dokku_bin);
    let resources = filter_plan(plan(&manifest), args.target.as_deref());

    let diffs = compute_diffs(&resources, &dokku);
    display_diff(&diffs);
    Ok(())
}

/// `dokkctl validate`
pub fn validate(args: ManifestArgs) -> Result<()> {
    let path = manifest_path(args.manifest);
    let manifest = Manifest::load(&path)?;

    println!(
        "  {} {} is valid ({} apps, {} networks, {} services)",
        "✓".green(),
        path.display(),
        manifest.apps.len(),
        manifest.networks.len(),
        manifest.services.len()
    );
    Ok(())
}
