//! App source deployment from a git repository or a docker image
//!
//! Change detection compares the app repo's HEAD sha (via `git:report
//! --git-sha`) before and after the sync; a moved sha triggers a
//! rebuild. The app is created first when missing.

use anyhow::Result;

use super::{ApplyContext, ApplyResult, Ensure, Resource, ResourceState};
use crate::dokku::Dokku;
use crate::resource::app::App;

/// Where the app's code comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitOrigin {
    Repository {
        url: String,
        /// Branch, tag or commit; the remote default branch when None.
        reference: Option<String>,
    },
    Image {
        name: String,
        user_name: Option<String>,
        user_email: Option<String>,
        build_dir: Option<String>,
    },
}

/// Deployed source for one app
#[derive(Debug, Clone)]
pub struct GitSource {
    pub app: String,
    pub origin: GitOrigin,
}

impl GitSource {
    /// HEAD sha of the app repository, `None` when the app has no repo
    /// yet. Exit-code-only: any failure reads as "no repository".
    fn sha(&self, dokku: &Dokku) -> Option<String> {
        let cmd = dokku
            .cmd(["git:report", self.app.as_str(), "--git-sha"])
            .merge_stderr();
        dokku.run(&cmd).ok().map(|captured| captured.text().to_string())
    }

    fn sync(&self, dokku: &Dokku) -> Result<ApplyResult, String> {
        match &self.origin {
            GitOrigin::Repository { url, reference } => {
                let mut args = vec!["git:sync".to_string(), self.app.clone(), url.clone()];
                if let Some(reference) = reference {
                    args.push(reference.clone());
                }
                dokku
                    .run(&dokku.cmd(args).merge_stderr())
                    .map(|_| ApplyResult::modified())
                    .map_err(|err| err.to_string())
            }
            GitOrigin::Image {
                name,
                user_name,
                user_email,
                build_dir,
            } => {
                let mut args = vec!["git:from-image".to_string(), self.app.clone(), name.clone()];
                if let Some(user_name) = user_name {
                    args.push(user_name.clone());
                }
                if let Some(user_email) = user_email {
                    args.push(user_email.clone());
                }
                if let Some(build_dir) = build_dir {
                    args.push("--build-dir".to_string());
                    args.push(build_dir.clone());
                }

                match dokku.run(&dokku.cmd(args).merge_stderr()) {
                    Ok(_) => Ok(ApplyResult::modified()),
                    // The one place failure text is classified: the
                    // subcommand predates dokku 0.24, and an unchanged
                    // image reports through a non-zero exit.
                    Err(err) => {
                        let text = err.to_string();
                        if text.contains("is not a dokku command") {
                            Err("git:from-image requires dokku >= 0.24.0".to_string())
                        } else if text.contains("No changes detected, skipping git commit") {
                            Ok(ApplyResult::NoChange)
                        } else {
                            Err(text)
                        }
                    }
                }
            }
        }
    }

    fn rebuild(&self, dokku: &Dokku) -> Result<(), String> {
        dokku
            .run(&dokku.cmd(["ps:rebuild", self.app.as_str()]).merge_stderr())
            .map(|_| ())
            .map_err(|err| err.to_string())
    }
}

impl Resource for GitSource {
    fn id(&self) -> String {
        format!("git:{}", self.app)
    }

    fn description(&self) -> String {
        match &self.origin {
            GitOrigin::Repository { url, .. } => format!("Deploy {} from {url}", self.app),
            GitOrigin::Image { name, .. } => format!("Deploy {} from image {name}", self.app),
        }
    }

    fn resource_type(&self) -> &'static str {
        "git"
    }

    /// Whether the remote moved is unknowable without running the sync,
    /// so the resource always applies.
    fn current_state(&self, _dokku: &Dokku) -> Result<ResourceState> {
        Ok(ResourceState::Unknown)
    }

    fn desired_state(&self) -> ResourceState {
        match &self.origin {
            GitOrigin::Repository { url, .. } => ResourceState::present(url.clone()),
            GitOrigin::Image { name, .. } => ResourceState::present(format!("image {name}")),
        }
    }

    fn apply(&self, dokku: &Dokku, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        if let Some(skipped) = ctx.skip_if_dry_run() {
            return Ok(skipped);
        }

        let app = App::new(&self.app, Ensure::Present);
        let created = match app.apply(dokku, ctx)? {
            ApplyResult::Failed { error } => return Ok(ApplyResult::Failed { error }),
            result => result.is_change(),
        };

        let sha_old = self.sha(dokku);

        match self.sync(dokku) {
            Ok(ApplyResult::NoChange) if !created => return Ok(ApplyResult::NoChange),
            Ok(_) => {}
            Err(error) => return Ok(ApplyResult::Failed { error }),
        }

        let sha_new = self.sha(dokku);
        if sha_new == sha_old {
            return Ok(if created {
                ApplyResult::Created
            } else {
                ApplyResult::NoChange
            });
        }

        if matches!(self.origin, GitOrigin::Repository { .. }) {
            if let Err(error) = self.rebuild(dokku) {
                return Ok(ApplyResult::Failed { error });
            }
        }

        Ok(if created {
            ApplyResult::Created
        } else {
            ApplyResult::modified()
        })
    }
}
