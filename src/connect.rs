//! Connection details for instance group members

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{Protocol, Settings};
use crate::director::{CloudDirector, VmRecord};
use crate::{Error, Result};

/// Guest OS family, derived from the template's OS type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    Windows,
}

impl OsFamily {
    pub fn from_os_type(os_type: &str) -> Self {
        if os_type.contains("windows") {
            OsFamily::Windows
        } else {
            OsFamily::Linux
        }
    }

    /// Login user that guest customization provisions credentials for
    pub fn username(&self) -> &'static str {
        match self {
            OsFamily::Windows => "Administrator",
            OsFamily::Linux => "root",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Linux => write!(f, "linux"),
            OsFamily::Windows => write!(f, "windows"),
        }
    }
}

/// How to reach and log into one VM
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectInfo {
    pub id: String,
    pub os: OsFamily,
    pub arch: String,
    pub protocol: Protocol,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub internal_addr: String,
    pub external_addr: String,
}

impl fmt::Debug for ConnectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectInfo")
            .field("id", &self.id)
            .field("os", &self.os)
            .field("arch", &self.arch)
            .field("protocol", &self.protocol)
            .field("username", &self.username)
            .field("internal_addr", &self.internal_addr)
            .field("external_addr", &self.external_addr)
            .finish_non_exhaustive()
    }
}

/// First populated address across the VM's network connections
pub fn first_address(vm: &VmRecord) -> Option<&str> {
    vm.addresses
        .iter()
        .map(|a| a.trim())
        .find(|a| !a.is_empty())
}

/// Describe how to connect to the VM behind `id`.
///
/// Only one NIC is expected, so the same address serves as internal and
/// external address.
pub fn describe<D>(director: &D, id: &str, settings: &Settings) -> Result<ConnectInfo>
where
    D: CloudDirector + ?Sized,
{
    let vm = director.get_vm(id)?;
    let os = OsFamily::from_os_type(&vm.os_type);

    let addr = first_address(&vm)
        .ok_or_else(|| Error::NoAddress(id.to_string()))?
        .to_string();

    Ok(ConnectInfo {
        id: id.to_string(),
        os,
        // Cloud Director only runs x86_64 guests
        arch: "amd64".to_string(),
        protocol: settings.protocol,
        username: os.username().to_string(),
        password: settings.password.clone(),
        key: settings.key.clone(),
        internal_addr: addr.clone(),
        external_addr: addr,
    })
}
