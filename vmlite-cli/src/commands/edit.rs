use clap::Args;

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Name of the VM
    pub name: String,

    /// Number of virtual CPUs
    #[arg(long)]
    pub cpus: Option<u8>,

    /// Memory in MiB
    #[arg(long, value_name = "MIB")]
    pub memory: Option<u32>,

    /// Seconds to wait for the guest before forcing it off
    #[arg(long, value_name = "SECS")]
    pub grace_period: Option<u64>,
}

impl EditArgs {
    fn is_empty(&self) -> bool {
        self.cpus.is_none() && self.memory.is_none() && self.grace_period.is_none()
    }
}

/// Change the resources of a stopped VM.
pub fn execute(args: EditArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let name = args.name.as_str();
    if args.is_empty() {
        anyhow::bail!("at least one of --cpus, --memory or --grace-period must be specified");
    }

    let dir = global.options().vm_dir(name);
    if !dir.initialized() {
        anyhow::bail!("vm not initialized, name={}", name);
    }
    // A running controller holds the lock on config.json; rewriting the
    // file would release it.
    if let Some(pid) = dir.pid() {
        anyhow::bail!("vm is running, stop it first, name={}, pid={}", name, pid);
    }

    let mut config = dir.load_config()?;
    if let Some(cpus) = args.cpus {
        tracing::info!(vm = %name, current = config.cpus, new = cpus, "change cpu count");
        config.cpus = cpus;
    }
    if let Some(memory) = args.memory {
        tracing::info!(vm = %name, current = config.memory_mib, new = memory, "change memory size");
        config.memory_mib = memory;
    }
    if let Some(secs) = args.grace_period {
        tracing::info!(
            vm = %name,
            current = config.shutdown.grace_period_secs,
            new = secs,
            "change grace period"
        );
        config.shutdown.grace_period_secs = secs;
    }

    config.validate()?;
    dir.save_config(&config)?;
    println!("{}", name);
    Ok(())
}
