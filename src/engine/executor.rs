//! Sequential apply with confirmation, progress and a summary
//!
//! One resource at a time, one subprocess at a time. A failed resource
//! is recorded and the run continues with the next one; partial
//! application within a failed resource is reported by the resource
//! itself.

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use super::differ::{compute_diffs, display_diff};
use crate::dokku::Dokku;
use crate::resource::{ApplyContext, ApplyResult, Resource};

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Verbose output
    pub verbose: bool,
}

/// Summary of execution results
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::NoChange => self.no_change += 1,
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified { .. } => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Reconcile every resource in order.
pub fn execute(
    dokku: &Dokku,
    resources: &[Box<dyn Resource>],
    opts: &ExecuteOptions,
) -> Result<ExecuteSummary> {
    // 1. Show what will change
    let diffs = compute_diffs(resources, dokku);
    display_diff(&diffs);

    if diffs.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(ExecuteSummary::default());
    }

    // 2. Confirm (unless --yes)
    if !opts.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(ExecuteSummary {
            skipped: diffs.len(),
            ..Default::default()
        });
    }

    // 3. Apply sequentially
    println!();
    println!("  {} Applying {} resources...", "→".cyan(), resources.len());

    let progress = apply_bar(resources.len() as u64);
    let mut summary = ExecuteSummary::default();
    let mut failures: Vec<(String, String)> = Vec::new();

    for resource in resources {
        let mut ctx = ApplyContext { dry_run: false };

        let result = match resource.apply(dokku, &mut ctx) {
            Ok(result) => result,
            Err(err) => ApplyResult::Failed {
                error: format!("{err:#}"),
            },
        };

        let symbol = match &result {
            ApplyResult::NoChange => "○",
            ApplyResult::Created | ApplyResult::Modified { .. } | ApplyResult::Removed => "✓",
            ApplyResult::Failed { .. } => "✗",
            ApplyResult::Skipped { .. } => "⊘",
        };
        progress.set_message(format!("{symbol} {}", resource.id()));
        progress.inc(1);

        if let ApplyResult::Failed { error } = &result {
            failures.push((resource.id(), error.clone()));
        }
        if opts.verbose {
            if let ApplyResult::Modified { changed } = &result {
                if !changed.is_empty() {
                    log::info!("{} changed: {}", resource.id(), changed.join(", "));
                }
            }
        }

        summary.record(&result);
    }

    progress.finish_and_clear();

    // 4. Report
    for (id, error) in &failures {
        println!("    {} {}: {}", "✗".red(), id, error);
    }
    print_summary(&summary);

    Ok(summary)
}

fn apply_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("  [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Host state applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Host state applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} resources modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} resources removed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::app::App;
    use crate::resource::domains::{DomainState, Domains};
    use crate::resource::Ensure;
    use reconcile::ScriptedRunner;

    fn opts() -> ExecuteOptions {
        ExecuteOptions {
            dry_run: false,
            yes: true,
            verbose: false,
        }
    }

    #[test]
    fn converged_plan_applies_nothing() {
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

        let summary = execute(&dokku, &resources, &opts()).unwrap();
        assert_eq!(summary, ExecuteSummary::default());
    }

    #[test]
    fn dry_run_stops_after_the_diff() {
        let runner = ScriptedRunner::new()
            // one read for the diff; no mutating command is scripted
            .fail("dokku --quiet apps:exists api", "does not exist");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let resources: Vec<Box<dyn Resource>> = vec![Box::new(App::new("api", Ensure::Present))];

        let summary = execute(
            &dokku,
            &resources,
            &ExecuteOptions {
                dry_run: true,
                yes: true,
                verbose: false,
            },
        )
        .unwrap();
        assert_eq!(summary.total_changes(), 0);
    }

    #[test]
    fn failure_is_recorded_and_the_run_continues() {
        let runner = ScriptedRunner::new()
            // diff pass
            .fail("dokku --quiet apps:exists bad", "does not exist")
            .fail("dokku --quiet apps:exists good", "does not exist")
            // apply pass
            .fail("dokku --quiet apps:exists bad", "does not exist")
            .fail("dokku apps:create bad", "invalid app name")
            .fail("dokku --quiet apps:exists good", "does not exist")
            .ok("dokku apps:create good", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let resources: Vec<Box<dyn Resource>> = vec![
            Box::new(App::new("bad", Ensure::Present)),
            Box::new(App::new("good", Ensure::Present)),
        ];

        let summary = execute(&dokku, &resources, &opts()).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 1);
    }
}
