//! vcd-fleet CLI - drive a Cloud Director instance group from the shell

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use vcd_fleet::{InstanceGroup, InstanceGroupConfig, RestClient, VersionInfo};

#[derive(Parser)]
#[command(name = "vcd-fleet")]
#[command(about = "Elastic VM instance groups on VMware Cloud Director")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true, conflicts_with = "from_env")]
    config: Option<PathBuf>,

    /// Read configuration from VCD_* environment variables
    #[arg(long, global = true)]
    from_env: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve or create the vApp and print provider info
    Init,
    /// Add VMs to the group
    Increase {
        /// Number of VMs to add
        count: usize,
    },
    /// Remove VMs from the group
    Decrease {
        /// VM ids (hrefs) to remove
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Report the lifecycle state of every VM
    Update,
    /// Print connection details for one VM
    Connect {
        /// VM id (href)
        id: String,
    },
    /// Delete the vApp and all of its VMs
    Shutdown,
    /// Show build information
    Version,
}

#[derive(Serialize)]
struct Increased {
    requested: usize,
    added: usize,
}

#[derive(Serialize)]
struct Decreased {
    requested: usize,
    removed: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("vcd_fleet=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        let version = VersionInfo::current();
        println!("{} {} ({})", version.name, version.version, version.build_info());
        return Ok(());
    }

    let group = connect(&cli)?;

    match cli.command {
        Commands::Init => print_json(&group.init()?)?,
        Commands::Increase { count } => {
            let added = group.increase(count);
            print_json(&Increased {
                requested: count,
                added,
            })?;
        }
        Commands::Decrease { ids } => {
            let removed = group.decrease(&ids);
            print_json(&Decreased {
                requested: ids.len(),
                removed,
            })?;
        }
        Commands::Update => print_json(&group.update()?)?,
        Commands::Connect { id } => print_json(&group.connect_info(&id)?)?,
        Commands::Shutdown => group.shutdown()?,
        Commands::Version => {}
    }

    Ok(())
}

fn connect(cli: &Cli) -> vcd_fleet::Result<InstanceGroup<RestClient>> {
    let config = match &cli.config {
        Some(path) => InstanceGroupConfig::from_file(path)?,
        None if cli.from_env => InstanceGroupConfig::from_env()?,
        None => {
            return Err(vcd_fleet::Error::config(
                "either --config or --from-env is required",
            ))
        }
    };
    tracing::debug!(?config, "Loaded configuration");

    InstanceGroup::connect(config)
}

fn print_json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
