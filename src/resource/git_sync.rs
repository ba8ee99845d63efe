//! git-sync remote for an app

use reconcile::{ReportSpec, Scope};
use std::collections::BTreeMap;

use super::properties::PropertyResource;
use super::Ensure;

const KEYS: &[&str] = &["remote"];

pub fn git_sync(app: &str, remote: Option<String>, ensure: Ensure) -> PropertyResource {
    let mut desired = BTreeMap::new();
    if let Some(remote) = remote {
        desired.insert("remote".to_string(), remote);
    }
    PropertyResource::new(
        "git-sync",
        Scope::App(app.to_string()),
        "git-sync",
        ReportSpec::new("git-sync-", KEYS),
        KEYS,
        desired,
        false,
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
    fn points_the_remote_at_the_declared_repository() {
        let runner = ScriptedRunner::new()
            .ok(
                "dokku --quiet git-sync:report api",
                "Git sync remote:       https://github.com/old/app.git",
            )
            .ok(
                "dokku --quiet git-sync:set api remote https://github.com/new/app.git",
                "",
            );
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let resource = git_sync(
            "api",
            Some("https://github.com/new/app.git".to_string()),
            Ensure::Present,
        );

        let mut ctx = ApplyContext::default();
        assert_eq!(
            resource.apply(&dokku, &mut ctx).unwrap(),
            ApplyResult::Modified {
                changed: vec!["remote".to_string()]
            }
        );
    }

    #[test]
    fn matching_remote_is_noop() {
        let runner = ScriptedRunner::new().ok(
            "dokku --quiet git-sync:report api",
            "Git sync remote:       https://github.com/new/app.git",
        );
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let resource = git_sync(
            "api",
            Some("https://github.com/new/app.git".to_string()),
            Ensure::Present,
        );

        let mut ctx = ApplyContext::default();
        assert_eq!(resource.apply(&dokku, &mut ctx).unwrap(), ApplyResult::NoChange);
    }
}
