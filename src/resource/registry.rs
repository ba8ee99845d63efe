//! Image registry credentials and image name for an app
//!
//! `absent` resets the whole configuration by blanking every settable
//! key, keyed off the report's `enabled` flag.

use reconcile::{ReportSpec, Scope};
use std::collections::BTreeMap;

use super::properties::PropertyResource;
use super::Ensure;

const ALLOWED_KEYS: &[&str] = &["enabled", "password", "image", "server", "username"];
const SETTABLE_KEYS: &[&str] = &["image", "password", "server", "username"];

pub fn registry(app: &str, desired: BTreeMap<String, String>, ensure: Ensure) -> PropertyResource {
    PropertyResource::new(
        "registry",
        Scope::App(app.to_string()),
        "registry",
        ReportSpec::new("registry-", ALLOWED_KEYS).bool_key("enabled"),
        SETTABLE_KEYS,
        desired,
        true,
        ensure,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dokku::Dokku;
    use crate::resource::{ApplyContext, ApplyResult, Resource};
    use reconcile::ScriptedRunner;

    #[test]
    fn configures_registry_credentials() {
        let runner = ScriptedRunner::new()
            .ok(
                "dokku --quiet registry:report api",
                "Registry enabled:   false\nRegistry server:    \nRegistry username:  \nRegistry password:  \nRegistry image:     ",
            )
            .ok("dokku --quiet registry:set api password hunter2", "")
            .ok("dokku --quiet registry:set api server docker.io", "")
            .ok("dokku --quiet registry:set api username ci", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let resource = registry(
            "api",
            [
                ("server".to_string(), "docker.io".to_string()),
                ("username".to_string(), "ci".to_string()),
                ("password".to_string(), "hunter2".to_string()),
            ]
            .into_iter()
            .collect(),
            Ensure::Present,
        );

        let mut ctx = ApplyContext::default();
        let result = resource.apply(&dokku, &mut ctx).unwrap();
        match result {
            ApplyResult::Modified { changed } => {
                assert_eq!(changed, vec!["password", "server", "username"]);
            }
            other => panic!("expected modification, got {other:?}"),
        }
    }
}
