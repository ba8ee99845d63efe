//! AWS ECR integration properties for an app

use reconcile::{ReportSpec, Scope};
use std::collections::BTreeMap;

use super::properties::PropertyResource;
use super::Ensure;

const ALLOWED_KEYS: &[&str] = &["enabled", "account-id", "image-repo", "region"];
const SETTABLE_KEYS: &[&str] = &["account-id", "image-repo", "region"];

pub fn ecr(app: &str, desired: BTreeMap<String, String>, ensure: Ensure) -> PropertyResource {
    PropertyResource::new(
        "ecr",
        Scope::App(app.to_string()),
        "ecr",
        ReportSpec::new("ecr-", ALLOWED_KEYS).bool_key("enabled"),
        SETTABLE_KEYS,
        desired,
        true,
        ensure,
    )
}
