//! Version stamping and provider information

use serde::{Deserialize, Serialize};

pub const NAME: &str = "fleeting-plugin-vcd";

/// Maximum number of VMs Cloud Director allows in one vApp
pub const MAX_SIZE: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
    pub revision: String,
    pub reference: String,
    pub built_at: String,
}

impl VersionInfo {
    /// Version of this build; revision, reference and build time are stamped
    /// through `VCD_FLEET_REVISION`, `VCD_FLEET_REFERENCE` and `VCD_FLEET_BUILT`
    pub fn current() -> Self {
        Self {
            name: NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            revision: option_env!("VCD_FLEET_REVISION").unwrap_or("HEAD").to_string(),
            reference: option_env!("VCD_FLEET_REFERENCE").unwrap_or("HEAD").to_string(),
            built_at: option_env!("VCD_FLEET_BUILT").unwrap_or("now").to_string(),
        }
    }

    pub fn build_info(&self) -> String {
        format!(
            "sha={}; ref={}; built={}",
            self.revision, self.reference, self.built_at
        )
    }
}

/// Identity of an initialized instance group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub max_size: usize,
    pub version: String,
    pub build_info: String,
}

impl ProviderInfo {
    pub fn new(org: &str, vdc: &str, network: &str, vapp: &str) -> Self {
        let version = VersionInfo::current();
        Self {
            id: ["vcd", org, vdc, network, vapp].join("/"),
            max_size: MAX_SIZE,
            version: version.version.clone(),
            build_info: version.build_info(),
        }
    }
}
