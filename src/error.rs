//! Error types for VCD instance groups

use std::fmt;

use thiserror::Error;

use crate::director::DirectorError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {}", .0.join("; "))]
    Config(Vec<String>),

    #[error("Looking up vApp {name}: {source}")]
    ResourceLookup {
        name: String,
        #[source]
        source: DirectorError,
    },

    #[error("Creating vApp {name}: {source}")]
    ResourceCreate {
        name: String,
        #[source]
        source: DirectorError,
    },

    #[error("Provisioning VM {vm} failed while {step}: {source}")]
    Provision {
        vm: String,
        step: ProvisionStep,
        #[source]
        source: Box<Error>,
    },

    #[error("Injecting credentials: {0}")]
    CredentialInjection(String),

    #[error("Unsupported SSH key: {0}")]
    UnsupportedKey(String),

    #[error("Removing VM {id}: {source}")]
    Removal {
        id: String,
        #[source]
        source: DirectorError,
    },

    #[error("Listing vApp members: {0}")]
    Reconciliation(#[source] DirectorError),

    #[error("No external address found for VM {0}")]
    NoAddress(String),

    #[error("vApp {0} has been shut down")]
    ShutDown(String),

    #[error("Cloud Director error: {0}")]
    Director(#[from] DirectorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a configuration error from a single message
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(vec![msg.into()])
    }

    /// The provisioning step that failed, if this is a provisioning error
    pub fn provision_step(&self) -> Option<ProvisionStep> {
        match self {
            Error::Provision { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Steps of adding one VM to the vApp, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    ResolveVApp,
    ResolveTemplate,
    BuildNetwork,
    CreateVm,
    LookupVm,
    InjectCredentials,
    PowerOn,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProvisionStep::ResolveVApp => "resolving vApp",
            ProvisionStep::ResolveTemplate => "resolving template",
            ProvisionStep::BuildNetwork => "building network section",
            ProvisionStep::CreateVm => "creating VM",
            ProvisionStep::LookupVm => "looking up created VM",
            ProvisionStep::InjectCredentials => "injecting credentials",
            ProvisionStep::PowerOn => "powering on vApp",
        };
        f.write_str(s)
    }
}
