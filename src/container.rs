//! vApp resolution with a write-once cached handle
//!
//! Resolving a vApp by name walks org, VDC and query service on every call.
//! After the first success only the href is kept and refreshed directly.

use parking_lot::Mutex;

use crate::director::{CloudDirector, Scope, VAppRecord};
use crate::{Error, Result};

pub const VAPP_DESCRIPTION: &str = "vApp created for GitLab fleeting";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Handle {
    Unresolved,
    Resolved(String),
    /// Torn down; the vApp is never looked up or created again
    Deleted,
}

pub struct ContainerResolver {
    scope: Scope,
    name: String,
    network: String,
    /// Held across the whole lookup-or-create and across teardown so
    /// concurrent callers cannot create or delete the vApp twice
    handle: Mutex<Handle>,
}

impl ContainerResolver {
    pub fn new(scope: Scope, name: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
            network: network.into(),
            handle: Mutex::new(Handle::Unresolved),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Href of the vApp, if it has been resolved
    pub fn cached_href(&self) -> Option<String> {
        match &*self.handle.lock() {
            Handle::Resolved(href) => Some(href.clone()),
            _ => None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        *self.handle.lock() == Handle::Deleted
    }

    /// Find the vApp by cached href or by name, creating it when absent
    pub fn resolve<D>(&self, director: &D) -> Result<VAppRecord>
    where
        D: CloudDirector + ?Sized,
    {
        let mut handle = self.handle.lock();

        match &*handle {
            Handle::Deleted => return Err(Error::ShutDown(self.name.clone())),
            Handle::Resolved(href) => {
                return director.refresh_vapp(href).map_err(|source| Error::ResourceLookup {
                    name: self.name.clone(),
                    source,
                })
            }
            Handle::Unresolved => {}
        }

        let vapp = match self.lookup(director)? {
            Some(vapp) => vapp,
            None => self.create(director)?,
        };

        *handle = Handle::Resolved(vapp.href.clone());
        Ok(vapp)
    }

    /// Delete the vApp with all of its VMs.
    ///
    /// The handle only becomes deleted once the delete task succeeds, so a
    /// failed teardown can be retried. Later calls do nothing.
    pub fn teardown<D>(&self, director: &D) -> Result<()>
    where
        D: CloudDirector + ?Sized,
    {
        let mut handle = self.handle.lock();

        let href = match &*handle {
            Handle::Deleted => return Ok(()),
            Handle::Resolved(href) => Some(href.clone()),
            Handle::Unresolved => self.lookup(director)?.map(|vapp| vapp.href),
        };

        match href {
            Some(href) => {
                tracing::info!(vapp = %href, "Shutting down. Deleting vApp");
                let task = director.delete_vapp(&href)?;
                director.wait_task(&task)?;
            }
            None => tracing::info!(vapp = %self.name, "No vApp to delete"),
        }

        *handle = Handle::Deleted;
        Ok(())
    }

    fn lookup<D>(&self, director: &D) -> Result<Option<VAppRecord>>
    where
        D: CloudDirector + ?Sized,
    {
        director
            .find_vapp(&self.scope, &self.name)
            .map_err(|source| Error::ResourceLookup {
                name: self.name.clone(),
                source,
            })
    }

    fn create<D>(&self, director: &D) -> Result<VAppRecord>
    where
        D: CloudDirector + ?Sized,
    {
        let create_err = |source| Error::ResourceCreate {
            name: self.name.clone(),
            source,
        };

        tracing::info!(vapp = %self.name, network = %self.network, "vApp not found, creating it");

        let mut vapp = director
            .create_vapp(&self.scope, &self.name, VAPP_DESCRIPTION)
            .map_err(create_err)?;
        let task = director
            .attach_network(&self.scope, &vapp, &self.network)
            .map_err(create_err)?;
        director.wait_task(&task).map_err(create_err)?;

        vapp.network = Some(self.network.clone());
        Ok(vapp)
    }
}
