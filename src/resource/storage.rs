//! Persistent storage mounts (`host-dir:container-dir`)
//!
//! Mounting is per-directory; a failure stops the remaining mounts of
//! the same resource with no rollback of those already applied. The
//! host directory can optionally be created (world-writable, chowned to
//! the container user) or removed alongside the mount.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{ApplyContext, ApplyResult, Ensure, Resource, ResourceState};
use crate::dokku::Dokku;

/// One `host:container` mount pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host_dir: PathBuf,
    pub container_dir: String,
}

impl Mount {
    /// Split a `host:container` declaration at the first colon and
    /// expand a leading tilde in the host part.
    pub fn parse(raw: &str) -> Result<Self> {
        let Some((host, container)) = raw.split_once(':') else {
            bail!("invalid mount {raw:?}: expected host-dir:container-dir");
        };
        Ok(Self {
            host_dir: PathBuf::from(shellexpand::tilde(host).as_ref()),
            container_dir: container.to_string(),
        })
    }

    /// The form dokku prints in `storage:list`.
    fn spec(&self) -> String {
        format!("{}:{}", self.host_dir.display(), self.container_dir)
    }
}

/// Storage mounts for one app
#[derive(Debug, Clone)]
pub struct StorageMounts {
    pub app: String,
    pub mounts: Vec<Mount>,
    pub create_host_dir: bool,
    pub destroy_host_dir: bool,
    pub uid: u32,
    pub gid: u32,
    pub ensure: Ensure,
}

impl StorageMounts {
    fn existing(&self, dokku: &Dokku) -> Result<Vec<String>> {
        if !dokku.app_exists(&self.app) {
            bail!("app {} does not exist", self.app);
        }
        Ok(dokku.run_lines(&dokku.quiet(["storage:list", self.app.as_str()]))?)
    }

    fn prepare_host_dir(&self, dir: &Path) -> Result<bool> {
        if !self.create_host_dir {
            return Ok(false);
        }

        let existed = dir.exists();
        if existed && !dir.is_dir() {
            bail!("host directory {} is not a directory", dir.display());
        }
        if !existed {
            fs::create_dir_all(dir)
                .with_context(|| format!("could not create {}", dir.display()))?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(dir, fs::Permissions::from_mode(0o777))?;
            std::os::unix::fs::chown(dir, Some(self.uid), Some(self.gid))
                .with_context(|| format!("could not chown {}", dir.display()))?;
        }

        Ok(!existed)
    }

    fn remove_host_dir(&self, dir: &Path) -> Result<bool> {
        if !self.destroy_host_dir || !dir.exists() {
            return Ok(false);
        }
        if !dir.is_dir() {
            bail!("host directory {} is not a directory", dir.display());
        }
        fs::remove_dir(dir).with_context(|| format!("could not remove {}", dir.display()))?;
        Ok(true)
    }

    fn missing_mounts(&self, existing: &[String]) -> Vec<Mount> {
        self.mounts
            .iter()
            .filter(|mount| !existing.contains(&mount.spec()))
            .cloned()
            .collect()
    }

    fn attached_mounts(&self, existing: &[String]) -> Vec<Mount> {
        self.mounts
            .iter()
            .filter(|mount| existing.contains(&mount.spec()))
            .cloned()
            .collect()
    }
}

impl Resource for StorageMounts {
    fn id(&self) -> String {
        format!("storage:{}", self.app)
    }

    fn description(&self) -> String {
        match self.ensure {
            Ensure::Present => format!("Mount storage for {}", self.app),
            Ensure::Absent => format!("Unmount storage for {}", self.app),
        }
    }

    fn resource_type(&self) -> &'static str {
        "storage"
    }

    fn current_state(&self, dokku: &Dokku) -> Result<ResourceState> {
        let existing = self.existing(dokku)?;

        match self.ensure {
            Ensure::Present => {
                let missing = self.missing_mounts(&existing);
                if missing.is_empty() {
                    Ok(ResourceState::Present { details: None })
                } else {
                    Ok(ResourceState::Modified {
                        from: existing.join(", "),
                        to: missing
                            .iter()
                            .map(Mount::spec)
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
                }
            }
            Ensure::Absent => {
                let attached = self.attached_mounts(&existing);
                if attached.is_empty() {
                    Ok(ResourceState::Absent)
                } else {
                    Ok(ResourceState::present(
                        attached
                            .iter()
                            .map(Mount::spec)
                            .collect::<Vec<_>>()
                            .join(", "),
                    ))
                }
            }
        }
    }

    fn desired_state(&self) -> ResourceState {
        match self.ensure {
            Ensure::Present => ResourceState::Present { details: None },
            Ensure::Absent => ResourceState::Absent,
        }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let existing = self.existing(dokku)?;
        let mut changed = Vec::new();

        match self.ensure {
            Ensure::Present => {
                let missing = self.missing_mounts(&existing);
                if missing.is_empty() && !self.create_host_dir {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }

                // One mount at a time; the first failure aborts the
                // rest, leaving earlier mounts applied.
                for mount in &self.mounts {
                    if self.prepare_host_dir(&mount.host_dir)? {
                        changed.push(format!("dir:{}", mount.host_dir.display()));
                    }
                    if existing.contains(&mount.spec()) {
                        continue;
                    }
                    let cmd = dokku.quiet(["storage:mount", self.app.as_str(), mount.spec().as_str()]);
                    if let Err(err) = dokku.run(&cmd) {
                        return Ok(ApplyResult::Failed {
                            error: partial_error(&err.to_string(), &changed),
                        });
                    }
                    changed.push(mount.spec());
                }

                if changed.is_empty() {
                    Ok(ApplyResult::NoChange)
                } else {
                    Ok(ApplyResult::Modified { changed })
                }
            }
            Ensure::Absent => {
                let attached = self.attached_mounts(&existing);
                if attached.is_empty() && !self.destroy_host_dir {
                    return Ok(ApplyResult::NoChange);
                }
                if let Some(skipped) = ctx.skip_if_dry_run() {
                    return Ok(skipped);
                }

                for mount in &self.mounts {
                    if self.remove_host_dir(&mount.host_dir)? {
                        changed.push(format!("dir:{}", mount.host_dir.display()));
                    }
                    if !existing.contains(&mount.spec()) {
                        continue;
                    }
                    let cmd = dokku.quiet(["storage:unmount", self.app.as_str(), mount.spec().as_str()]);
                    if let Err(err) = dokku.run(&cmd) {
                        return Ok(ApplyResult::Failed {
                            error: partial_error(&err.to_string(), &changed),
                        });
                    }
                    changed.push(mount.spec());
                }

                if changed.is_empty() {
                    Ok(ApplyResult::NoChange)
                } else {
                    Ok(ApplyResult::Removed)
                }
            }
        }
    }
}

fn partial_error(error: &str, changed: &[String]) -> String {
    if changed.is_empty() {
        error.to_string()
    } else {
        format!("{error} (applied before failure: {})", changed.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::ScriptedRunner;

    fn mounts(raw: &[&str]) -> Vec<Mount> {
        raw.iter().map(|m| Mount::parse(m).unwrap()).collect()
    }

    fn storage(ensure: Ensure, declared: &[&str]) -> StorageMounts {
        StorageMounts {
            app: "api".to_string(),
            mounts: mounts(declared),
            create_host_dir: false,
            destroy_host_dir: false,
            uid: 32767,
            gid: 32767,
            ensure,
        }
    }

    #[test]
    fn parses_mount_at_first_colon() {
        let mount = Mount::parse("/var/lib/dokku/data/storage/api:/app/storage").unwrap();
        assert_eq!(
            mount.host_dir,
            PathBuf::from("/var/lib/dokku/data/storage/api")
        );
        assert_eq!(mount.container_dir, "/app/storage");
    }

    #[test]
    fn rejects_mount_without_colon() {
        assert!(Mount::parse("/just/a/path").is_err());
    }

    #[test]
    fn mounts_only_the_missing_pairs() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet apps:exists api", "")
            .ok("dokku --quiet storage:list api", "/data/api:/app/storage")
            .ok("dokku --quiet storage:mount api /data/api-cache:/app/cache", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let storage = storage(
            Ensure::Present,
            &["/data/api:/app/storage", "/data/api-cache:/app/cache"],
        );

        let mut ctx = ApplyContext::default();
        let result = storage.apply(&dokku, &mut ctx).unwrap();
        assert_eq!(
            result,
            ApplyResult::Modified {
                changed: vec!["/data/api-cache:/app/cache".to_string()]
            }
        );
    }

    #[test]
    fn all_mounted_is_noop() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet apps:exists api", "")
            .ok("dokku --quiet storage:list api", "/data/api:/app/storage");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let storage = storage(Ensure::Present, &["/data/api:/app/storage"]);

        let mut ctx = ApplyContext::default();
        assert_eq!(storage.apply(&dokku, &mut ctx).unwrap(), ApplyResult::NoChange);
    }

    #[test]
    fn missing_app_is_an_error() {
        let runner = ScriptedRunner::new().fail("dokku --quiet apps:exists ghost", "does not exist");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let mut storage = storage(Ensure::Present, &["/data/x:/x"]);
        storage.app = "ghost".to_string();

        let mut ctx = ApplyContext::default();
        let err = storage.apply(&dokku, &mut ctx).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn unmounts_attached_pairs_only() {
        let runner = ScriptedRunner::new()
            .ok("dokku --quiet apps:exists api", "")
            .ok("dokku --quiet storage:list api", "/data/api:/app/storage")
            .ok("dokku --quiet storage:unmount api /data/api:/app/storage", "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));
        let storage = storage(
            Ensure::Absent,
            &["/data/api:/app/storage", "/data/never-mounted:/x"],
        );

        let mut ctx = ApplyContext::default();
        assert_eq!(storage.apply(&dokku, &mut ctx).unwrap(), ApplyResult::Removed);
    }

    #[test]
    fn create_host_dir_prepares_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let host_dir = tmp.path().join("volumes/api");
        let spec = format!("{}:/app/storage", host_dir.display());

        let runner = ScriptedRunner::new()
            .ok("dokku --quiet apps:exists api", "")
            .ok("dokku --quiet storage:list api", "")
            .ok(&format!("dokku --quiet storage:mount api {spec}"), "");
        let dokku = Dokku::with_runner("dokku", Box::new(runner));

        // chown to our own uid/gid so the test runs unprivileged
        let (uid, gid) = current_ids(tmp.path());
        let storage = StorageMounts {
            app: "api".to_string(),
            mounts: mounts(&[spec.as_str()]),
            create_host_dir: true,
            destroy_host_dir: false,
            uid,
            gid,
            ensure: Ensure::Present,
        };

        let mut ctx = ApplyContext::default();
        let result = storage.apply(&dokku, &mut ctx).unwrap();
        assert!(result.is_change());
        assert!(host_dir.is_dir());
    }

    #[cfg(unix)]
    fn current_ids(path: &Path) -> (u32, u32) {
        use std::os::unix::fs::MetadataExt;
        std::fs::metadata(path)
            .map(|meta| (meta.uid(), meta.gid()))
            .unwrap_or((0, 0))
    }
}
