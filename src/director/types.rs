//! Value types exchanged with Cloud Director

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Org and virtual datacenter a vApp lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub org: String,
    pub vdc: String,
}

/// The vApp backing an instance group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VAppRecord {
    pub href: String,
    pub name: String,
    /// Name of the first attached network, if any
    pub network: Option<String>,
}

/// A catalog template and the VM inside it that new members are sourced from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    pub href: String,
    pub name: String,
    pub vm_href: String,
}

/// One VM as reported by Cloud Director
#[derive(Debug, Clone, PartialEq)]
pub struct VmRecord {
    pub href: String,
    pub name: String,
    /// Status name, e.g. `POWERED_ON` (see [`status_name`])
    pub status: String,
    /// Guest OS type from the VM spec section, e.g. `ubuntu64Guest`
    pub os_type: String,
    /// IP address of each network connection, empty while unassigned
    pub addresses: Vec<String>,
    pub guest_customization: GuestCustomization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IpAllocationMode {
    Dhcp,
    Pool,
}

impl IpAllocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpAllocationMode::Dhcp => "DHCP",
            IpAllocationMode::Pool => "POOL",
        }
    }
}

impl fmt::Display for IpAllocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IpAllocationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DHCP" => Ok(IpAllocationMode::Dhcp),
            "POOL" => Ok(IpAllocationMode::Pool),
            other => Err(format!("invalid ip_allocation_mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConnection {
    pub network: String,
    pub network_connection_index: u32,
    pub is_connected: bool,
    pub needs_customization: bool,
    pub ip_address_allocation_mode: IpAllocationMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConnectionSection {
    pub primary_network_connection_index: u32,
    pub network_connection: Vec<NetworkConnection>,
}

/// Guest customization section of a VM.
///
/// Fields the instance group does not manage are carried in `extra` so a
/// read-modify-write cycle does not drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCustomization {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub admin_password_enabled: bool,
    #[serde(default)]
    pub admin_password_auto: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub reset_password_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization_script: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Everything needed to add one VM to the vApp
#[derive(Debug, Clone, PartialEq)]
pub struct VmSpec {
    pub name: String,
    pub template: TemplateRef,
    pub network: NetworkConnectionSection,
    pub cpu_count: u32,
    pub memory_mb: u64,
    pub storage_profile: Option<String>,
}

/// Handle to a long-running Cloud Director task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub href: String,
    pub operation: String,
}

impl Task {
    pub fn new(href: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            operation: operation.into(),
        }
    }
}

/// Map a numeric vApp/VM status code to its name
pub fn status_name(code: i32) -> &'static str {
    match code {
        -1 => "FAILED_CREATION",
        0 => "UNRESOLVED",
        1 => "RESOLVED",
        2 => "DEPLOYED",
        3 => "SUSPENDED",
        4 => "POWERED_ON",
        5 => "WAITING_FOR_INPUT",
        6 => "UNKNOWN",
        7 => "UNRECOGNIZED",
        8 => "POWERED_OFF",
        9 => "INCONSISTENT_STATE",
        10 => "MIXED",
        11 => "DESCRIPTOR_PENDING",
        12 => "COPYING_CONTENTS",
        13 => "DISK_CONTENTS_PENDING",
        14 => "QUARANTINED",
        15 => "QUARANTINE_EXPIRED",
        16 => "REJECTED",
        17 => "TRANSFER_TIMEOUT",
        18 => "VAPP_UNDEPLOYED",
        19 => "VAPP_PARTIALLY_DEPLOYED",
        20 => "PARTIALLY_POWERED_OFF",
        21 => "PARTIALLY_SUSPENDED",
        _ => "UNRECOGNIZED",
    }
}
