//! Turn a manifest into an ordered resource list
//!
//! Ordering matters within one app: the app itself first, network
//! wiring before the first deploy, domains before certificates, and
//! the deploy itself before Let's Encrypt issuance. Across apps the
//! manifest order is kept. Everything applies sequentially.

use reconcile::Scope;

use crate::manifest::{AppSpec, Manifest};
use crate::resource::acl::AppAcl;
use crate::resource::app::App;
use crate::resource::buildpacks::Buildpacks;
use crate::resource::builder::builder;
use crate::resource::cert::GlobalCert;
use crate::resource::checks::Checks;
use crate::resource::config_env::ConfigVars;
use crate::resource::docker_options::DockerOption;
use crate::resource::domains::Domains;
use crate::resource::ecr::ecr;
use crate::resource::git::{GitOrigin, GitSource};
use crate::resource::git_sync::git_sync;
use crate::resource::http_auth::HttpAuth;
use crate::resource::lets_encrypt::LetsEncrypt;
use crate::resource::limits::{BoundKind, ResourceBounds};
use crate::resource::network::{Network, NetworkProperty};
use crate::resource::ports::Ports;
use crate::resource::proxy::Proxy;
use crate::resource::ps_scale::ProcessScale;
use crate::resource::service::{ServiceInstance, ServiceLink};
use crate::resource::storage::{Mount, StorageMounts};
use crate::resource::{Ensure, Resource};

/// Build the full ordered resource list for a manifest.
pub fn plan(manifest: &Manifest) -> Vec<Box<dyn Resource>> {
    let mut resources: Vec<Box<dyn Resource>> = Vec::new();

    // Host-wide pieces first: networks and services are link targets,
    // global settings apply to every app.
    for network in &manifest.networks {
        resources.push(Box::new(Network::new(&network.name, network.state)));
    }
    for service in &manifest.services {
        resources.push(Box::new(ServiceInstance::new(&service.service, &service.name)));
    }

    if let Some(config) = &manifest.global.config {
        resources.push(Box::new(
            ConfigVars::new(None, config.string_vars())
                .with_unset(config.unset.clone())
                .with_restart(config.restart),
        ));
    }
    if let Some(global_builder) = &manifest.global.builder {
        resources.push(Box::new(builder(Scope::Global, global_builder.clone())));
    }
    if let Some(cert) = &manifest.global.cert {
        resources.push(Box::new(GlobalCert {
            cert_path: cert.cert.clone(),
            key_path: cert.key.clone(),
            ensure: cert.state,
        }));
    }

    for app in &manifest.apps {
        plan_app(app, &mut resources);
    }

    resources
}

fn plan_app(app: &AppSpec, resources: &mut Vec<Box<dyn Resource>>) {
    resources.push(Box::new(App::new(&app.name, app.state)));

    // Destroying the app destroys its per-app configuration with it.
    if app.state == Ensure::Absent {
        return;
    }

    for property in &app.network {
        resources.push(Box::new(NetworkProperty {
            app: app.name.clone(),
            network: property.network.clone(),
            phase: property.phase,
        }));
    }

    if let Some(config) = &app.config {
        resources.push(Box::new(
            ConfigVars::new(Some(&app.name), config.string_vars())
                .with_unset(config.unset.clone())
                .with_restart(config.restart),
        ));
    }

    if let Some(app_builder) = &app.builder {
        resources.push(Box::new(builder(
            Scope::App(app.name.clone()),
            app_builder.clone(),
        )));
    }

    if let Some(buildpacks) = &app.buildpacks {
        resources.push(Box::new(Buildpacks::new(&app.name, buildpacks.clone())));
    }

    for option in &app.docker_options {
        resources.push(Box::new(DockerOption::new(
            &app.name,
            option.phase,
            &option.option,
            option.state,
        )));
    }

    if let Some(storage) = &app.storage {
        let mounts = storage
            .mounts
            .iter()
            .filter_map(|mount| Mount::parse(mount).ok())
            .collect();
        resources.push(Box::new(StorageMounts {
            app: app.name.clone(),
            mounts,
            create_host_dir: storage.create_host_dir,
            destroy_host_dir: storage.destroy_host_dir,
            uid: storage.user,
            gid: storage.group,
            ensure: storage.state,
        }));
    }

    if let Some(limits) = &app.limits {
        resources.push(Box::new(ResourceBounds {
            app: app.name.clone(),
            kind: BoundKind::Limit,
            resources: limits.string_resources(),
            process_type: limits.process_type.clone(),
            clear_before: limits.clear_before,
            ensure: limits.state,
        }));
    }
    if let Some(reserves) = &app.reserves {
        resources.push(Box::new(ResourceBounds {
            app: app.name.clone(),
            kind: BoundKind::Reserve,
            resources: reserves.string_resources(),
            process_type: reserves.process_type.clone(),
            clear_before: reserves.clear_before,
            ensure: reserves.state,
        }));
    }

    if let Some(ports) = &app.ports {
        resources.push(Box::new(Ports::new(
            &app.name,
            ports.mappings.clone(),
            ports.state,
        )));
    }

    if let Some(domains) = &app.domains {
        resources.push(Box::new(Domains::new(
            &app.name,
            domains.names.clone(),
            domains.state,
        )));
    }

    if let Some(enabled) = app.checks {
        resources.push(Box::new(Checks::new(&app.name, enabled)));
    }
    if let Some(enabled) = app.proxy {
        resources.push(Box::new(Proxy::new(&app.name, enabled)));
    }

    if let Some(http_auth) = &app.http_auth {
        resources.push(Box::new(HttpAuth {
            app: app.name.clone(),
            username: http_auth.username.clone(),
            password: http_auth.password.clone(),
            ensure: http_auth.state,
        }));
    }

    if let Some(registry_spec) = &app.registry {
        resources.push(Box::new(crate::resource::registry::registry(
            &app.name,
            registry_spec.desired_values(),
            registry_spec.state,
        )));
    }
    if let Some(ecr_spec) = &app.ecr {
        resources.push(Box::new(ecr(
            &app.name,
            ecr_spec.desired_values(),
            ecr_spec.state,
        )));
    }
    if let Some(sync) = &app.git_sync {
        resources.push(Box::new(git_sync(
            &app.name,
            sync.remote.clone(),
            sync.state,
        )));
    }

    if let Some(acl) = &app.acl {
        resources.push(Box::new(AppAcl::new(
            &app.name,
            acl.users.clone(),
            acl.state,
        )));
    }

    for link in &app.links {
        resources.push(Box::new(ServiceLink {
            service: link.service.clone(),
            name: link.name.clone(),
            app: app.name.clone(),
            ensure: link.state,
        }));
    }

    if let Some(scale) = &app.scale {
        resources.push(Box::new(ProcessScale::new(
            &app.name,
            scale.processes.clone(),
            scale.skip_deploy,
        )));
    }

    if let Some(git) = &app.git {
        let origin = match (&git.repository, &git.image) {
            (Some(url), _) => GitOrigin::Repository {
                url: url.clone(),
                reference: git.reference.clone(),
            },
            (None, Some(image)) => GitOrigin::Image {
                name: image.clone(),
                user_name: git.user_name.clone(),
                user_email: git.user_email.clone(),
                build_dir: git.build_dir.clone(),
            },
            // validate() has already rejected the neither-nor case
            (None, None) => return,
        };
        resources.push(Box::new(GitSource {
            app: app.name.clone(),
            origin,
        }));
    }

    // Certificate issuance wants domains and a deployed app in place.
    if let Some(lets_encrypt) = &app.lets_encrypt {
        resources.push(Box::new(LetsEncrypt::new(
            &app.name,
            lets_encrypt.state,
            lets_encrypt.auto_renew,
        )));
    }
}

/// Parse a target string like "domains.api" into (resource_type, name)
pub fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = target.split('.').collect();
    match parts.len() {
        1 => (Some(parts[0].to_string()), None),
        2 => (Some(parts[0].to_string()), Some(parts[1].to_string())),
        _ => (None, Some(target.to_string())),
    }
}

/// Check if a resource matches the filter
pub fn matches_filter(
    resource: &dyn Resource,
    resource_type: Option<&str>,
    name: Option<&str>,
) -> bool {
    if let Some(rt) = resource_type {
        let matches_type = match rt {
            "apps" => resource.resource_type() == "app",
            "certs" => {
                resource.resource_type() == "global-cert"
                    || resource.resource_type() == "lets-encrypt"
            }
            "limits" => resource.resource_type().starts_with("resource-"),
            "networks" => resource.resource_type().starts_with("network"),
            _ => resource.resource_type() == rt,
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name
        && !resource.id().contains(n)
    {
        return false;
    }

    true
}

/// Apply a "type.name" target filter to a plan.
pub fn filter_plan(resources: Vec<Box<dyn Resource>>, target: Option<&str>) -> Vec<Box<dyn Resource>> {
    let Some(target) = target else {
        return resources;
    };
    let (resource_type, name) = parse_target(target);
    resources
        .into_iter()
        .filter(|resource| {
            matches_filter(resource.as_ref(), resource_type.as_deref(), name.as_deref())
        })
        .collect()
}
