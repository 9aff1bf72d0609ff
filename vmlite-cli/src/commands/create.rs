use clap::Args;
use vmlite::runtime::{BackendCommand, ShutdownOptions, VmConfig, layout::validate_vm_name};
use vmlite_shared::constants::{shutdown, vm_defaults};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Name of the VM
    pub name: String,

    /// Number of virtual CPUs
    #[arg(long, default_value_t = vm_defaults::DEFAULT_CPUS)]
    pub cpus: u8,

    /// Memory in MiB
    #[arg(long, value_name = "MIB", default_value_t = vm_defaults::DEFAULT_MEMORY_MIB)]
    pub memory: u32,

    /// Seconds to wait for the guest before forcing it off
    #[arg(long, value_name = "SECS", default_value_t = shutdown::DEFAULT_GRACE_PERIOD_SECS)]
    pub grace_period: u64,

    /// Environment variable for the hypervisor (KEY=VALUE)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
    pub env: Vec<(String, String)>,

    /// Hypervisor command line, after `--`
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

pub fn execute(args: CreateArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    validate_vm_name(&args.name)?;

    let Some((executable, rest)) = args.command.split_first() else {
        anyhow::bail!("missing hypervisor command");
    };
    let mut backend = BackendCommand::new(executable.as_str()).with_args(rest.iter().cloned());
    backend.env = args.env;

    let config = VmConfig {
        backend,
        cpus: args.cpus,
        memory_mib: args.memory,
        shutdown: ShutdownOptions {
            grace_period_secs: args.grace_period,
        },
    };

    let dir = global.options().vm_dir(&args.name);
    dir.create(&config)?;
    println!("{}", args.name);
    Ok(())
}

fn parse_env(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {:?}", s)),
    }
}
