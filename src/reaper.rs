//! Removing VMs from the vApp

use crate::director::{CloudDirector, DirectorError};
use crate::{Error, Result};

/// Stop and delete one VM.
///
/// Uses undeploy with the default power action, which shuts the guest down
/// instead of pulling the plug. A VM that is already stopped goes straight
/// to deletion; one that is already gone counts as removed.
pub fn remove_vm<D>(director: &D, id: &str) -> Result<()>
where
    D: CloudDirector + ?Sized,
{
    let removal_err = |source: DirectorError| Error::Removal {
        id: id.to_string(),
        source,
    };

    match director.undeploy_vm(id) {
        Ok(task) => director.wait_task(&task).map_err(removal_err)?,
        Err(e) if e.is_not_found() => {
            tracing::debug!(vm = %id, "VM already deleted");
            return Ok(());
        }
        Err(e) if e.is_invalid_state() => {
            tracing::debug!(vm = %id, error = %e, "VM already undeployed");
        }
        Err(e) => return Err(removal_err(e)),
    }

    match director.delete_vm(id) {
        Ok(task) => director.wait_task(&task).map_err(removal_err),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(removal_err(e)),
    }
}
