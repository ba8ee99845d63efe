//! Builder selection and build directory for an app or globally

use reconcile::{ReportSpec, Scope};
use std::collections::BTreeMap;

use super::properties::PropertyResource;
use super::Ensure;

const ALLOWED_KEYS: &[&str] = &["build-dir", "selected"];

/// Builder properties, e.g. forcing `dockerfile` over auto-detection or
/// pointing builds at a monorepo subdirectory.
pub fn builder(scope: Scope, desired: BTreeMap<String, String>) -> PropertyResource {
    PropertyResource::new(
        "builder",
        scope,
        "builder",
        ReportSpec::new("builder-", ALLOWED_KEYS),
        ALLOWED_KEYS,
        desired,
        false,
        Ensure::Present,
    )
}
