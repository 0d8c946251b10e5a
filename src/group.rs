//! Instance group: the operations exposed to the capacity manager

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::config::InstanceGroupConfig;
use crate::connect::{self, ConnectInfo};
use crate::container::ContainerResolver;
use crate::credentials::Credential;
use crate::director::{CloudDirector, RestClient};
use crate::provisioner::{self, ProvisionPlan};
use crate::reaper;
use crate::state::{classify, Classification, MemberState, Reconciliation};
use crate::version::ProviderInfo;
use crate::{Error, Result};

/// Elastic group of VMs living in a single vApp
pub struct InstanceGroup<D: CloudDirector> {
    config: InstanceGroupConfig,
    director: D,
    container: ContainerResolver,
    plan: ProvisionPlan,
    credential: Credential,
    /// Serializes VM creation within the process
    provision_lock: Mutex<()>,
    size: AtomicUsize,
    span: tracing::Span,
}

impl InstanceGroup<RestClient> {
    /// Validate `config` and authenticate against Cloud Director
    pub fn connect(config: InstanceGroupConfig) -> Result<Self> {
        config.validate()?;
        let url = config.parsed_url()?;
        let client = RestClient::connect(&url, &config.org, &config.token, config.insecure)?
            .with_poll_interval(config.poll_interval());
        Self::new(config, client)
    }
}

impl<D: CloudDirector> InstanceGroup<D> {
    pub fn new(config: InstanceGroupConfig, director: D) -> Result<Self> {
        config.validate()?;
        let credential = config
            .credential()
            .ok_or_else(|| Error::config("either password or ssh key are required"))?;

        let container = ContainerResolver::new(config.scope(), &config.vapp, &config.network);
        let plan = ProvisionPlan {
            vm_name_prefix: config.vm_name_prefix.clone(),
            catalog: config.catalog.clone(),
            template: config.template.clone(),
            network: config.network.clone(),
            ip_allocation_mode: config.ip_allocation_mode,
            cpu_count: config.cpu_count,
            memory_mb: config.memory_mb,
            storage_profile: config.storage_profile.clone(),
        };
        let span = tracing::info_span!(
            "instance_group",
            org = %config.org,
            vdc = %config.virtual_datacenter,
            network = %config.network
        );

        Ok(Self {
            config,
            director,
            container,
            plan,
            credential,
            provision_lock: Mutex::new(()),
            size: AtomicUsize::new(0),
            span,
        })
    }

    pub fn config(&self) -> &InstanceGroupConfig {
        &self.config
    }

    pub fn director(&self) -> &D {
        &self.director
    }

    /// Resolve or create the vApp and describe this group
    pub fn init(&self) -> Result<ProviderInfo> {
        let _span = self.span.enter();

        let vapp = self.container.resolve(&self.director)?;
        tracing::info!(vapp = %vapp.name, href = %vapp.href, "Instance group ready");

        Ok(ProviderInfo::new(
            &self.config.org,
            &self.config.virtual_datacenter,
            &self.config.network,
            &self.config.vapp,
        ))
    }

    /// Add `delta` VMs one after another and return how many succeeded.
    ///
    /// A failed VM is logged and skipped; the remaining ones are still attempted.
    pub fn increase(&self, delta: usize) -> usize {
        let _span = self.span.enter();
        let _serial = self.provision_lock.lock();

        if self.container.is_deleted() {
            tracing::error!(requested = delta, vapp = %self.container.name(), "Instance group has been shut down");
            return 0;
        }

        let mut added = 0;
        for unit in 1..=delta {
            match provisioner::add_vm(&self.director, &self.container, &self.plan, &self.credential) {
                Ok(vm) => {
                    added += 1;
                    tracing::info!(id = %vm.href, vm = %vm.name, "Added VM to vApp");
                }
                Err(e) => {
                    tracing::error!(unit, requested = delta, error = %e, "Adding VM to vApp");
                }
            }
        }
        added
    }

    /// Remove the given VMs and return the ids that were removed
    pub fn decrease(&self, ids: &[String]) -> Vec<String> {
        let _span = self.span.enter();

        if ids.is_empty() {
            return Vec::new();
        }

        let workers = self.config.removal_workers.max(1);
        if workers == 1 || ids.len() == 1 {
            return self.remove_all(ids);
        }

        let chunk_size = ids.len().div_ceil(workers);
        std::thread::scope(|s| {
            let handles: Vec<_> = ids
                .chunks(chunk_size)
                .map(|chunk| {
                    let span = self.span.clone();
                    s.spawn(move || {
                        let _span = span.enter();
                        self.remove_all(chunk)
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_default())
                .collect()
        })
    }

    fn remove_all(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .filter(|id| match reaper::remove_vm(&self.director, id) {
                Ok(()) => {
                    tracing::debug!(id = %id, "Removed VM");
                    true
                }
                Err(e) => {
                    tracing::error!(id = %id, error = %e, "Deleting VM");
                    false
                }
            })
            .cloned()
            .collect()
    }

    /// List the vApp's VMs and map their statuses to lifecycle states
    pub fn update(&self) -> Result<Reconciliation> {
        let _span = self.span.enter();

        let vapp = self.container.resolve(&self.director)?;
        let vms = self
            .director
            .list_vms(&vapp.href)
            .map_err(Error::Reconciliation)?;

        self.size.store(vms.len(), Ordering::Relaxed);

        let mut members = Vec::with_capacity(vms.len());
        for vm in &vms {
            match classify(&vm.status) {
                Classification::Report(state) => members.push(MemberState {
                    id: vm.href.clone(),
                    state,
                }),
                Classification::Withhold => {
                    tracing::debug!(id = %vm.href, vm = %vm.name, status = %vm.status, "Unhandled instance status");
                }
                Classification::Unexpected => {
                    tracing::error!(id = %vm.href, vm = %vm.name, status = %vm.status, "Unexpected instance status");
                }
            }
        }

        Ok(Reconciliation {
            members,
            total: vms.len(),
        })
    }

    /// Number of VMs seen by the last [`update`](Self::update)
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    pub fn connect_info(&self, id: &str) -> Result<ConnectInfo> {
        let _span = self.span.enter();
        connect::describe(&self.director, id, &self.config.settings)
    }

    /// Delete the vApp and every VM in it.
    ///
    /// A failed teardown can be retried; once it succeeds later calls do
    /// nothing and the group refuses to resolve or grow the vApp again.
    pub fn shutdown(&self) -> Result<()> {
        let _span = self.span.enter();
        self.container.teardown(&self.director)
    }
}
