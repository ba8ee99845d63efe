//! The desired-state manifest
//!
//! A TOML file describing what the Dokku host should look like. Parsing
//! is strict per resource kind, and `validate()` runs before any dokku
//! command: missing required fields and invalid value types are caught
//! here, never mid-apply.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::resource::docker_options::Phase;
use crate::resource::domains::DomainState;
use crate::resource::limits::ALLOWED_RESOURCES;
use crate::resource::network::AttachPhase;
use crate::resource::ports::PortState;
use crate::resource::Ensure;

/// Builder keys dokku accepts.
const BUILDER_KEYS: &[&str] = &["build-dir", "selected"];

// ============================================================================
// Manifest root
// ============================================================================

/// The whole desired state of one host
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Host-wide settings (global config vars, global builder, cert)
    #[serde(default)]
    pub global: GlobalSpec,

    /// Container networks
    #[serde(default)]
    pub networks: Vec<NetworkSpec>,

    /// Datastore service instances
    #[serde(default)]
    pub services: Vec<ServiceSpec>,

    /// Applications
    #[serde(default)]
    pub apps: Vec<AppSpec>,
}

impl Manifest {
    /// Load and validate a manifest file. A leading `~` in the path is
    /// expanded.
    pub fn load(path: &Path) -> Result<Self> {
        let expanded = shellexpand::tilde(&path.to_string_lossy().into_owned()).into_owned();
        let content = std::fs::read_to_string(&expanded)
            .with_context(|| format!("Could not read manifest: {expanded}"))?;
        let manifest: Manifest =
            toml::from_str(&content).context("Invalid TOML in manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// The default manifest location: ./dokku.toml, falling back to
    /// ~/.config/dokkctl/dokku.toml.
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from("dokku.toml");
        if local.exists() {
            return local;
        }
        dirs::home_dir()
            .map(|home| home.join(".config").join("dokkctl").join("dokku.toml"))
            .unwrap_or(local)
    }

    /// Validate the whole manifest before anything touches the host.
    pub fn validate(&self) -> Result<()> {
        self.global.validate().context("Invalid [global] section")?;

        for network in &self.networks {
            if network.name.is_empty() {
                bail!("network name must not be empty");
            }
        }

        for service in &self.services {
            if service.service.is_empty() || service.name.is_empty() {
                bail!("missing required arguments: service, name");
            }
        }

        for app in &self.apps {
            app.validate()
                .with_context(|| format!("Invalid app '{}'", app.name))?;
        }

        Ok(())
    }

    pub fn find_app(&self, name: &str) -> Option<&AppSpec> {
        self.apps.iter().find(|app| app.name == name)
    }
}

// ============================================================================
// Host-wide settings
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSpec {
    #[serde(default)]
    pub config: Option<ConfigSpec>,

    /// Global builder properties (`build-dir`, `selected`)
    #[serde(default)]
    pub builder: Option<BTreeMap<String, String>>,

    /// Host-wide TLS certificate
    #[serde(default)]
    pub cert: Option<CertSpec>,
}

impl GlobalSpec {
    fn validate(&self) -> Result<()> {
        if let Some(config) = &self.config {
            config.validate()?;
        }
        if let Some(builder) = &self.builder {
            validate_builder_keys(builder)?;
        }
        if let Some(cert) = &self.cert {
            cert.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertSpec {
    pub cert: Option<String>,
    pub key: Option<String>,
    #[serde(default)]
    pub state: Ensure,
}

impl CertSpec {
    fn validate(&self) -> Result<()> {
        if self.state == Ensure::Present {
            let mut missing = Vec::new();
            if self.cert.is_none() {
                missing.push("cert");
            }
            if self.key.is_none() {
                missing.push("key");
            }
            if !missing.is_empty() {
                bail!("missing required arguments: {}", missing.join(", "));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSpec {
    pub name: String,
    #[serde(default)]
    pub state: Ensure,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    /// The plugin name, e.g. "postgres"
    pub service: String,
    /// The instance name, e.g. "main-db"
    pub name: String,
}

// ============================================================================
// Config vars
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSpec {
    /// Raw values straight from TOML so non-string types can be
    /// reported as a validation error instead of being coerced.
    #[serde(default)]
    pub vars: BTreeMap<String, toml::Value>,

    #[serde(default)]
    pub unset: Vec<String>,

    /// Allow dokku to restart the app when setting vars
    #[serde(default)]
    pub restart: bool,
}

impl ConfigSpec {
    fn validate(&self) -> Result<()> {
        let invalid: Vec<&str> = self
            .vars
            .iter()
            .filter(|(_, value)| !value.is_str())
            .map(|(key, _)| key.as_str())
            .collect();

        if !invalid.is_empty() {
            bail!(
                "All config values must be strings, found invalid types for {}",
                invalid.join(", ")
            );
        }
        Ok(())
    }

    /// The validated string form of `vars`.
    pub fn string_vars(&self) -> BTreeMap<String, String> {
        self.vars
            .iter()
            .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
            .collect()
    }
}

// ============================================================================
// Applications
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSpec {
    pub name: String,

    #[serde(default)]
    pub state: Ensure,

    #[serde(default)]
    pub domains: Option<DomainsSpec>,

    #[serde(default)]
    pub config: Option<ConfigSpec>,

    #[serde(default)]
    pub ports: Option<PortsSpec>,

    #[serde(default)]
    pub docker_options: Vec<DockerOptionSpec>,

    /// Builder properties (`build-dir`, `selected`)
    #[serde(default)]
    pub builder: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub storage: Option<StorageSpec>,

    #[serde(default)]
    pub limits: Option<BoundsSpec>,

    #[serde(default)]
    pub reserves: Option<BoundsSpec>,

    /// Route traffic through the proxy
    #[serde(default)]
    pub proxy: Option<bool>,

    /// Zero-downtime deployment checks
    #[serde(default)]
    pub checks: Option<bool>,

    #[serde(default)]
    pub http_auth: Option<HttpAuthSpec>,

    #[serde(default)]
    pub lets_encrypt: Option<LetsEncryptSpec>,

    #[serde(default)]
    pub registry: Option<RegistrySpec>,

    #[serde(default)]
    pub ecr: Option<EcrSpec>,

    #[serde(default)]
    pub git_sync: Option<GitSyncSpec>,

    #[serde(default)]
    pub scale: Option<ScaleSpec>,

    /// Ordered buildpack list
    #[serde(default)]
    pub buildpacks: Option<Vec<String>>,

    #[serde(default)]
    pub acl: Option<AclSpec>,

    /// Service links
    #[serde(default)]
    pub links: Vec<LinkSpec>,

    /// Network attachment properties
    #[serde(default)]
    pub network: Vec<NetworkPropertySpec>,

    /// Source deployment (git repository or docker image)
    #[serde(default)]
    pub git: Option<GitSpec>,
}

impl AppSpec {
    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("missing required arguments: name");
        }

        if let Some(domains) = &self.domains {
            domains.validate()?;
        }
        if let Some(config) = &self.config {
            config.validate()?;
        }
        if let Some(ports) = &self.ports {
            ports.validate()?;
        }
        if let Some(builder) = &self.builder {
            validate_builder_keys(builder)?;
        }
        if let Some(storage) = &self.storage {
            storage.validate()?;
        }
        if let Some(limits) = &self.limits {
            limits.validate()?;
        }
        if let Some(reserves) = &self.reserves {
            reserves.validate()?;
        }
        if let Some(http_auth) = &self.http_auth {
            http_auth.validate()?;
        }
        if let Some(registry) = &self.registry {
            registry.validate()?;
        }
        if let Some(ecr) = &self.ecr {
            ecr.validate()?;
        }
        if let Some(git_sync) = &self.git_sync {
            git_sync.validate()?;
        }
        if let Some(git) = &self.git {
            git.validate()?;
        }

        Ok(())
    }
}

fn validate_builder_keys(builder: &BTreeMap<String, String>) -> Result<()> {
    let unknown: Vec<&str> = builder
        .keys()
        .filter(|key| !BUILDER_KEYS.contains(&key.as_str()))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        bail!(
            "unknown builder keys {}, allowed: {}",
            unknown.join(", "),
            BUILDER_KEYS.join(", ")
        );
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DomainsSpec {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub state: DomainState,
}

impl DomainsSpec {
    fn validate(&self) -> Result<()> {
        let needs_names = matches!(
            self.state,
            DomainState::Present | DomainState::Absent | DomainState::Set
        );
        if needs_names && self.names.is_empty() {
            bail!("missing required arguments: names");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortsSpec {
    #[serde(default)]
    pub mappings: Vec<String>,
    #[serde(default)]
    pub state: PortState,
}

impl PortsSpec {
    fn validate(&self) -> Result<()> {
        if matches!(self.state, PortState::Present | PortState::Absent) && self.mappings.is_empty()
        {
            bail!("missing required arguments: mappings");
        }
        for mapping in &self.mappings {
            if mapping.split(':').count() != 3 {
                bail!("invalid port mapping {mapping:?}: expected scheme:host-port:container-port");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DockerOptionSpec {
    pub phase: Phase,
    pub option: String,
    #[serde(default)]
    pub state: Ensure,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSpec {
    pub mounts: Vec<String>,
    #[serde(default)]
    pub create_host_dir: bool,
    #[serde(default)]
    pub destroy_host_dir: bool,
    /// Numeric uid owning created host directories; 32767 is the
    /// herokuish container user.
    #[serde(default = "default_storage_id")]
    pub user: u32,
    #[serde(default = "default_storage_id")]
    pub group: u32,
    #[serde(default)]
    pub state: Ensure,
}

fn default_storage_id() -> u32 {
    32767
}

impl StorageSpec {
    fn validate(&self) -> Result<()> {
        if self.mounts.is_empty() {
            bail!("missing required arguments: mounts");
        }
        for mount in &self.mounts {
            if !mount.contains(':') {
                bail!("invalid mount {mount:?}: expected host-dir:container-dir");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundsSpec {
    /// Raw values; integers and strings are both accepted.
    #[serde(default)]
    pub resources: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub process_type: Option<String>,
    #[serde(default)]
    pub clear_before: bool,
    #[serde(default)]
    pub state: Ensure,
}

impl BoundsSpec {
    fn validate(&self) -> Result<()> {
        if self.state == Ensure::Present && self.resources.is_empty() {
            bail!("missing required arguments: resources");
        }

        let unknown: Vec<&str> = self
            .resources
            .keys()
            .filter(|key| !ALLOWED_RESOURCES.contains(&key.as_str()))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            bail!(
                "unknown resources {}, allowed: {}",
                unknown.join(", "),
                ALLOWED_RESOURCES.join(", ")
            );
        }

        for (key, value) in &self.resources {
            if !value.is_str() && !value.is_integer() {
                bail!("resource {key} must be a string or integer");
            }
        }
        Ok(())
    }

    /// Canonical string form of the declared resources.
    pub fn string_resources(&self) -> BTreeMap<String, String> {
        self.resources
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpAuthSpec {
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub state: Ensure,
}

impl HttpAuthSpec {
    fn validate(&self) -> Result<()> {
        if self.state == Ensure::Present {
            let mut missing = Vec::new();
            if self.username.is_none() {
                missing.push("username");
            }
            if self.password.is_none() {
                missing.push("password");
            }
            if !missing.is_empty() {
                bail!("missing required arguments: {}", missing.join(", "));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LetsEncryptSpec {
    #[serde(default)]
    pub state: Ensure,
    /// Install the shared renewal cron job when enabling
    #[serde(default = "default_true")]
    pub auto_renew: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySpec {
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub state: Ensure,
}

impl RegistrySpec {
    fn validate(&self) -> Result<()> {
        if self.state == Ensure::Present {
            let mut missing = Vec::new();
            if self.password.is_none() {
                missing.push("password");
            }
            if self.server.is_none() {
                missing.push("server");
            }
            if self.username.is_none() {
                missing.push("username");
            }
            if !missing.is_empty() {
                bail!("missing required arguments: {}", missing.join(", "));
            }
        }
        Ok(())
    }

    pub fn desired_values(&self) -> BTreeMap<String, String> {
        let mut desired = BTreeMap::new();
        if let Some(server) = &self.server {
            desired.insert("server".to_string(), server.clone());
        }
        if let Some(username) = &self.username {
            desired.insert("username".to_string(), username.clone());
        }
        if let Some(password) = &self.password {
            desired.insert("password".to_string(), password.clone());
        }
        if let Some(image) = &self.image {
            desired.insert("image".to_string(), image.clone());
        }
        desired
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EcrSpec {
    pub account_id: Option<String>,
    pub image_repo: Option<String>,
    #[serde(default = "default_ecr_region")]
    pub region: String,
    #[serde(default)]
    pub state: Ensure,
}

fn default_ecr_region() -> String {
    "us-east-1".to_string()
}

impl EcrSpec {
    fn validate(&self) -> Result<()> {
        if self.state == Ensure::Present {
            let mut missing = Vec::new();
            if self.account_id.is_none() {
                missing.push("account_id");
            }
            if self.image_repo.is_none() {
                missing.push("image_repo");
            }
            if !missing.is_empty() {
                bail!("missing required arguments: {}", missing.join(", "));
            }
        }
        Ok(())
    }

    pub fn desired_values(&self) -> BTreeMap<String, String> {
        let mut desired = BTreeMap::new();
        if let Some(account_id) = &self.account_id {
            desired.insert("account-id".to_string(), account_id.clone());
        }
        if let Some(image_repo) = &self.image_repo {
            desired.insert("image-repo".to_string(), image_repo.clone());
        }
        desired.insert("region".to_string(), self.region.clone());
        desired
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSyncSpec {
    pub remote: Option<String>,
    #[serde(default)]
    pub state: Ensure,
}

impl GitSyncSpec {
    fn validate(&self) -> Result<()> {
        if self.state == Ensure::Present && self.remote.is_none() {
            bail!("missing required arguments: remote");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScaleSpec {
    pub processes: BTreeMap<String, u32>,
    #[serde(default)]
    pub skip_deploy: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AclSpec {
    pub users: Vec<String>,
    #[serde(default)]
    pub state: Ensure,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkSpec {
    pub service: String,
    pub name: String,
    #[serde(default)]
    pub state: Ensure,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkPropertySpec {
    pub network: String,
    pub phase: AttachPhase,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitSpec {
    pub repository: Option<String>,
    /// Branch, tag or commit for repository deployments
    pub reference: Option<String>,
    pub image: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub build_dir: Option<String>,
}

impl GitSpec {
    fn validate(&self) -> Result<()> {
        match (&self.repository, &self.image) {
            (None, None) => bail!("missing required arguments: repository or image"),
            (Some(_), Some(_)) => bail!("repository and image are mutually exclusive"),
            _ => Ok(()),
        }
    }
}
