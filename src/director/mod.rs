//! Cloud Director control-plane boundary
//!
//! The instance group never talks HTTP directly: everything it needs from
//! the virtualization control plane goes through [`CloudDirector`]. The
//! production implementation is [`RestClient`]; tests substitute mocks.

pub mod client;
pub mod types;

pub use client::RestClient;
pub use types::*;

#[cfg(test)]
use mockall::automock;
use thiserror::Error;

/// Failures reported by the control plane
#[derive(Error, Debug)]
pub enum DirectorError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cloud Director returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous name {name}: {count} matches")]
    Ambiguous { name: String, count: usize },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Task {operation} failed: {message}")]
    TaskFailed { operation: String, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

pub type DirectorResult<T> = std::result::Result<T, DirectorError>;

impl DirectorError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DirectorError::NotFound(_))
    }

    /// A 400 from an action the entity is already past (e.g. undeploying a stopped VM)
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, DirectorError::Status { status: 400, .. })
    }
}

/// Operations the instance group consumes from Cloud Director.
///
/// Methods that start long-running work return a [`Task`]; callers block on
/// it with [`CloudDirector::wait_task`].
#[cfg_attr(test, automock)]
pub trait CloudDirector: Send + Sync {
    /// Find a vApp by name inside the org/VDC scope
    fn find_vapp(&self, scope: &Scope, name: &str) -> DirectorResult<Option<VAppRecord>>;

    /// Re-read a vApp directly by href
    fn refresh_vapp(&self, href: &str) -> DirectorResult<VAppRecord>;

    /// Create an empty vApp and wait until it exists
    fn create_vapp(&self, scope: &Scope, name: &str, description: &str) -> DirectorResult<VAppRecord>;

    /// Attach an org VDC network to a vApp
    fn attach_network(&self, scope: &Scope, vapp: &VAppRecord, network: &str) -> DirectorResult<Task>;

    fn resolve_template(&self, catalog: &str, template: &str) -> DirectorResult<TemplateRef>;

    /// Recompose the vApp with one more VM built from a template
    fn add_vm(&self, vapp: &VAppRecord, spec: &VmSpec) -> DirectorResult<Task>;

    fn find_vm(&self, vapp_href: &str, name: &str) -> DirectorResult<VmRecord>;

    fn get_vm(&self, href: &str) -> DirectorResult<VmRecord>;

    fn set_guest_customization(
        &self,
        vm: &VmRecord,
        section: &GuestCustomization,
    ) -> DirectorResult<Task>;

    /// Power on every VM of the vApp
    fn power_on_vapp(&self, vapp: &VAppRecord) -> DirectorResult<Task>;

    fn list_vms(&self, vapp_href: &str) -> DirectorResult<Vec<VmRecord>>;

    /// Soft stop: undeploy with the VM's default power action
    fn undeploy_vm(&self, href: &str) -> DirectorResult<Task>;

    fn delete_vm(&self, href: &str) -> DirectorResult<Task>;

    fn delete_vapp(&self, href: &str) -> DirectorResult<Task>;

    /// Poll a task until it succeeds or fails
    fn wait_task(&self, task: &Task) -> DirectorResult<()>;
}
