//! Adding VMs to the vApp
//!
//! Cloud Director does not run two recompose operations on the same vApp in
//! parallel, so every VM goes through template lookup, creation,
//! customization and power-on before the next one starts.

use crate::container::ContainerResolver;
use crate::credentials::{self, Credential};
use crate::director::{
    CloudDirector, IpAllocationMode, NetworkConnection, NetworkConnectionSection, VmRecord, VmSpec,
};
use crate::error::ProvisionStep;
use crate::names;
use crate::{Error, Result};

/// What every new VM is built from
#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    pub vm_name_prefix: String,
    pub catalog: String,
    pub template: String,
    pub network: String,
    pub ip_allocation_mode: Option<IpAllocationMode>,
    pub cpu_count: u32,
    pub memory_mb: u64,
    pub storage_profile: Option<String>,
}

/// Single NIC on `network`, connected and flagged for guest customization
pub fn network_section(
    network: &str,
    mode: Option<IpAllocationMode>,
) -> Result<NetworkConnectionSection> {
    let mode = mode.ok_or_else(|| Error::config("missing required plugin config: ip_allocation_mode"))?;
    Ok(NetworkConnectionSection {
        primary_network_connection_index: 0,
        network_connection: vec![NetworkConnection {
            network: network.to_string(),
            network_connection_index: 0,
            is_connected: true,
            needs_customization: true,
            ip_address_allocation_mode: mode,
        }],
    })
}

/// Provision one VM end to end.
///
/// A VM that fails after creation is left in the vApp as it is; the error
/// names it so an operator can remove it.
pub fn add_vm<D>(
    director: &D,
    container: &ContainerResolver,
    plan: &ProvisionPlan,
    credential: &Credential,
) -> Result<VmRecord>
where
    D: CloudDirector + ?Sized,
{
    let name = names::vm_name(&plan.vm_name_prefix);
    let fail = |step: ProvisionStep| {
        let vm = name.clone();
        move |source: Error| Error::Provision {
            vm,
            step,
            source: Box::new(source),
        }
    };

    let vapp = container.resolve(director).map_err(fail(ProvisionStep::ResolveVApp))?;

    let template = director
        .resolve_template(&plan.catalog, &plan.template)
        .map_err(Error::from)
        .map_err(fail(ProvisionStep::ResolveTemplate))?;

    let network = network_section(&plan.network, plan.ip_allocation_mode)
        .map_err(fail(ProvisionStep::BuildNetwork))?;

    let spec = VmSpec {
        name: name.clone(),
        template,
        network,
        cpu_count: plan.cpu_count,
        memory_mb: plan.memory_mb,
        storage_profile: plan.storage_profile.clone(),
    };

    tracing::debug!(vapp = %vapp.name, vm = %name, template = %spec.template.name, "Adding VM to vApp");

    director
        .add_vm(&vapp, &spec)
        .and_then(|task| director.wait_task(&task))
        .map_err(Error::from)
        .map_err(fail(ProvisionStep::CreateVm))?;

    // The recompose task does not hand back the new VM, so look it up by name
    let vm = director
        .find_vm(&vapp.href, &name)
        .map_err(Error::from)
        .map_err(fail(ProvisionStep::LookupVm))?;

    credentials::inject(director, &vm, credential).map_err(fail(ProvisionStep::InjectCredentials))?;

    // Power-on is only offered for the whole vApp; running VMs are unaffected
    director
        .power_on_vapp(&vapp)
        .and_then(|task| director.wait_task(&task))
        .map_err(Error::from)
        .map_err(fail(ProvisionStep::PowerOn))?;

    Ok(vm)
}
