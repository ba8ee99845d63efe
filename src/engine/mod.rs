//! Reconciliation engine: plan, diff, execute

pub mod differ;
pub mod executor;
pub mod planner;

pub use differ::{compute_diffs, display_diff};
pub use executor::{execute, ExecuteOptions, ExecuteSummary};
pub use planner::{filter_plan, matches_filter, parse_target, plan};
