//! VMware Cloud Director instance groups
//!
//! Manages an elastic group of disposable VMs for a fleet autoscaler. All
//! VMs of a group live in one vApp; the group grows by cloning a catalog
//! template into it and shrinks by deleting VMs by id.
//!
//! # Key Features
//!
//! - **Lazy vApp** - The vApp is found by name or created on first use
//! - **Static credentials** - Admin password or SSH key injected through guest customization
//! - **Partial success** - Growing and shrinking report how many units actually changed
//! - **Reconciliation** - VM power states mapped to creating/running/deleting
//!
//! # Example
//!
//! ```no_run
//! use vcd_fleet::{InstanceGroup, InstanceGroupConfig};
//!
//! let config = InstanceGroupConfig::from_env()?;
//! let group = InstanceGroup::connect(config)?;
//!
//! group.init()?;
//! let added = group.increase(2);
//!
//! for member in group.update()?.members {
//!     println!("{} {}", member.id, member.state);
//! }
//!
//! group.shutdown()?;
//! # Ok::<(), vcd_fleet::Error>(())
//! ```

pub mod config;
pub mod connect;
pub mod container;
pub mod credentials;
pub mod director;
pub mod error;
pub mod group;
pub mod names;
pub mod provisioner;
pub mod reaper;
pub mod scripts;
pub mod state;
pub mod version;

pub use config::{InstanceGroupConfig, Protocol, Settings};
pub use connect::{ConnectInfo, OsFamily};
pub use credentials::Credential;
pub use director::{CloudDirector, DirectorError, RestClient};
pub use error::{Error, ProvisionStep, Result};
pub use group::InstanceGroup;
pub use state::{LifecycleState, MemberState, Reconciliation};
pub use version::{ProviderInfo, VersionInfo};
