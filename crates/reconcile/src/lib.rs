//! # Reconcile
//!
//! A small library for reconciling declared configuration against the
//! current state of an external system, where the only window into that
//! system is the text output of its administration CLI.
//!
//! The crate factors the pattern into three pieces:
//!
//! - [`runner`]: spawn one command at a time as an argument vector (never
//!   through a shell) and capture its output, behind an injectable
//!   [`CommandRunner`] trait so tests replay canned output instead of
//!   touching the system.
//! - [`report`]: parse the semi-structured `key: value` reports these
//!   tools print, tolerating column alignment, normalizing key names and
//!   coercing flagged keys to booleans.
//! - [`property`]: a [`PropertyDomain`] strategy object describing one
//!   `<prefix>:report` / `<prefix>:set` command family, with per-key
//!   idempotent updates and partial-success error collection.
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{Cmd, PropertyDomain, ReportSpec, Scope, SystemRunner};
//!
//! let domain = PropertyDomain::new(
//!     "dokku",
//!     "builder",
//!     ReportSpec::new("builder-", &["build-dir", "selected"]),
//!     &["build-dir", "selected"],
//! );
//!
//! let runner = SystemRunner;
//! let scope = Scope::App("hello-world".to_string());
//! let current = domain.fetch_report(&runner, &scope)?;
//! let outcome = domain.set_values(&runner, &scope, &desired, &current);
//! ```

pub mod property;
pub mod report;
pub mod runner;

// Re-export main types at crate root
pub use property::{PropertyDomain, Scope, SetOutcome};
pub use report::{parse_report, Report, ReportSpec, ReportValue};
pub use runner::{Captured, Cmd, CommandRunner, RunError, ScriptedRunner, SystemRunner};
