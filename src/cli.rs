use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dokkctl")]
#[command(version)]
#[command(about = "Declarative state management for a Dokku host", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the dokku binary
    #[arg(long, global = true, default_value = "dokku", env = "DOKKCTL_DOKKU_BIN")]
    pub dokku_bin: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile the host against the manifest
    Apply(ApplyArgs),

    /// Show what apply would change, without changing anything
    Diff(TargetArgs),

    /// Parse and validate the manifest
    Validate(ManifestArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ManifestArgs {
    /// Manifest file (defaults to ./dokku.toml)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,
}

#[derive(Parser)]
pub struct TargetArgs {
    /// Manifest file (defaults to ./dokku.toml)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Only this resource type or "type.name" pair (e.g. "domains.api")
    pub target: Option<String>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Manifest file (defaults to ./dokku.toml)
    #[arg(short, long)]
    pub manifest: Option<PathBuf>,

    /// Only this resource type or "type.name" pair (e.g. "domains.api")
    pub target: Option<String>,

    /// Show the diff but skip every mutating command
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}
