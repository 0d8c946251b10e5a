//! Instance group configuration with builder pattern

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::credentials::Credential;
use crate::director::Scope;
use crate::{Error, Result};

pub use crate::director::IpAllocationMode;

/// Remote login protocol advertised to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Ssh,
    Winrm,
}

/// Connector settings supplied by the capacity manager
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub protocol: Protocol,
    /// Ignored for login: guest customization only provisions root/Administrator
    pub username: Option<String>,
    pub password: Option<String>,
    /// Private key in OpenSSH PEM form
    pub key: Option<String>,
    /// Read into `key` when the configuration is loaded
    pub key_path: Option<PathBuf>,
    pub use_static_credentials: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            protocol: Protocol::Ssh,
            username: None,
            password: None,
            key: None,
            key_path: None,
            use_static_credentials: true,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("protocol", &self.protocol)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .field("use_static_credentials", &self.use_static_credentials)
            .finish()
    }
}

impl Settings {
    /// Load `key_path` into `key` unless a key is already set
    pub fn load_key(&mut self) -> Result<()> {
        if self.key.is_none() {
            if let Some(path) = &self.key_path {
                self.key = Some(std::fs::read_to_string(path)?);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceGroupConfig {
    pub name: String,
    /// Cloud Director API root, e.g. `https://vcd.example.com/api`
    pub url: String,
    pub org: String,
    pub virtual_datacenter: String,
    pub network: String,
    pub ip_allocation_mode: Option<IpAllocationMode>,
    /// API token (Cloud Director 10.4 or later)
    pub token: String,
    pub catalog: String,
    pub template: String,
    /// vApp holding every VM of the group
    pub vapp: String,
    pub vm_name_prefix: String,
    pub storage_profile: Option<String>,
    pub cpu_count: u32,
    pub memory_mb: u64,
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Threads used to remove VMs; 1 removes them one after another
    pub removal_workers: usize,
    pub poll_interval_ms: u64,
    pub settings: Settings,
}

impl Default for InstanceGroupConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            url: String::new(),
            org: String::new(),
            virtual_datacenter: String::new(),
            network: String::new(),
            ip_allocation_mode: None,
            token: String::new(),
            catalog: String::new(),
            template: String::new(),
            vapp: String::new(),
            vm_name_prefix: String::new(),
            storage_profile: None,
            cpu_count: 0,
            memory_mb: 0,
            insecure: false,
            removal_workers: 1,
            poll_interval_ms: 3000,
            settings: Settings::default(),
        }
    }
}

impl fmt::Debug for InstanceGroupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceGroupConfig")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("org", &self.org)
            .field("virtual_datacenter", &self.virtual_datacenter)
            .field("network", &self.network)
            .field("ip_allocation_mode", &self.ip_allocation_mode)
            .field("catalog", &self.catalog)
            .field("template", &self.template)
            .field("vapp", &self.vapp)
            .field("vm_name_prefix", &self.vm_name_prefix)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl InstanceGroupConfig {
    pub fn builder() -> InstanceGroupConfigBuilder {
        InstanceGroupConfigBuilder::default()
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.settings.load_key()?;
        Ok(config)
    }

    /// Build a configuration from `VCD_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).unwrap_or_default();
        let mut errors = Vec::new();

        let ip_allocation_mode = match lookup("VCD_NETWORK_ALLOCATION_MODE") {
            Some(mode) => match mode.parse() {
                Ok(mode) => Some(mode),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            None => None,
        };

        let mut number = |key: &str| -> u64 {
            match lookup(key) {
                Some(raw) => raw.parse().unwrap_or_else(|_| {
                    errors.push(format!("invalid {}: {}", key, raw));
                    0
                }),
                None => 0,
            }
        };
        let cpu_count = u32::try_from(number("VCD_CPU_COUNT")).unwrap_or(0);
        let memory_mb = number("VCD_MEMORY_MB");

        if !errors.is_empty() {
            return Err(Error::Config(errors));
        }

        let mut config = Self {
            name: lookup("VCD_NAME").unwrap_or_else(|| "vcd".to_string()),
            url: var("VCD_URL"),
            org: var("VCD_ORG"),
            virtual_datacenter: var("VCD_VDC"),
            network: var("VCD_NETWORK"),
            ip_allocation_mode,
            token: var("VCD_TOKEN"),
            catalog: var("VCD_CATALOG"),
            template: var("VCD_TEMPLATE"),
            vapp: var("VCD_VAPP"),
            vm_name_prefix: var("VCD_VM_NAME_PREFIX"),
            storage_profile: lookup("VCD_STORAGE_PROFILE"),
            cpu_count,
            memory_mb,
            settings: Settings {
                password: lookup("VCD_PASSWORD"),
                key_path: lookup("VCD_SSH_KEY_PATH").map(PathBuf::from),
                ..Settings::default()
            },
            ..Self::default()
        };
        config.settings.load_key()?;
        Ok(config)
    }

    /// Check every required field, reporting all problems at once
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        let required = [
            ("name", &self.name),
            ("token", &self.token),
            ("url", &self.url),
            ("org", &self.org),
            ("virtual_datacenter", &self.virtual_datacenter),
            ("network", &self.network),
            ("catalog", &self.catalog),
            ("template", &self.template),
            ("vapp", &self.vapp),
            ("vm_name_prefix", &self.vm_name_prefix),
        ];
        for (field, value) in required {
            if value.is_empty() {
                errors.push(format!("missing required plugin config: {}", field));
            }
        }

        if !self.url.is_empty() {
            if let Err(e) = Url::parse(&self.url) {
                errors.push(format!("invalid url: {}", e));
            }
        }

        if self.ip_allocation_mode.is_none() {
            errors.push("missing required plugin config: ip_allocation_mode".into());
        }
        if self.cpu_count == 0 {
            errors.push("missing required plugin config: cpu_count".into());
        }
        if self.memory_mb == 0 {
            errors.push("missing required plugin config: memory_mb".into());
        }
        if self.removal_workers == 0 {
            errors.push("removal_workers must be at least 1".into());
        }
        if self.poll_interval_ms == 0 {
            errors.push("poll_interval_ms must be at least 1".into());
        }

        if !self.settings.use_static_credentials {
            errors.push("dynamic credentials are not supported yet".into());
        } else if Credential::from_settings(&self.settings).is_none() {
            // username is not checked: guest customization only provisions root or Administrator
            errors.push(
                "either root/Administrator password or ssh key are required when using static credentials"
                    .into(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(errors))
        }
    }

    pub fn parsed_url(&self) -> Result<Url> {
        Url::parse(&self.url).map_err(|e| Error::config(format!("invalid url: {}", e)))
    }

    pub fn scope(&self) -> Scope {
        Scope {
            org: self.org.clone(),
            vdc: self.virtual_datacenter.clone(),
        }
    }

    pub fn credential(&self) -> Option<Credential> {
        Credential::from_settings(&self.settings)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Default)]
pub struct InstanceGroupConfigBuilder {
    config: InstanceGroupConfig,
}

impl InstanceGroupConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = token.into();
        self
    }

    pub fn org(mut self, org: impl Into<String>) -> Self {
        self.config.org = org.into();
        self
    }

    pub fn virtual_datacenter(mut self, vdc: impl Into<String>) -> Self {
        self.config.virtual_datacenter = vdc.into();
        self
    }

    pub fn network(mut self, network: impl Into<String>, mode: IpAllocationMode) -> Self {
        self.config.network = network.into();
        self.config.ip_allocation_mode = Some(mode);
        self
    }

    pub fn template(mut self, catalog: impl Into<String>, template: impl Into<String>) -> Self {
        self.config.catalog = catalog.into();
        self.config.template = template.into();
        self
    }

    pub fn vapp(mut self, vapp: impl Into<String>) -> Self {
        self.config.vapp = vapp.into();
        self
    }

    pub fn vm_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.vm_name_prefix = prefix.into();
        self
    }

    pub fn storage_profile(mut self, profile: impl Into<String>) -> Self {
        self.config.storage_profile = Some(profile.into());
        self
    }

    pub fn cpu_count(mut self, count: u32) -> Self {
        self.config.cpu_count = count;
        self
    }

    pub fn memory_mb(mut self, mb: u64) -> Self {
        self.config.memory_mb = mb;
        self
    }

    pub fn removal_workers(mut self, workers: usize) -> Self {
        self.config.removal_workers = workers;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.settings.password = Some(password.into());
        self
    }

    pub fn key(mut self, pem: impl Into<String>) -> Self {
        self.config.settings.key = Some(pem.into());
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.config.settings.protocol = protocol;
        self
    }

    pub fn build(self) -> InstanceGroupConfig {
        self.config
    }

    pub fn build_validated(self) -> Result<InstanceGroupConfig> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
