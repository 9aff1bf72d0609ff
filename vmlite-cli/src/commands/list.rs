use clap::Args;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use vmlite::runtime::VmDir;

#[derive(Args, Debug)]
pub struct ListArgs {}

#[derive(Tabled)]
struct VmRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "CPUS")]
    cpus: String,
    #[tabled(rename = "MEMORY")]
    memory: String,
    #[tabled(rename = "PID")]
    pid: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

impl VmRow {
    fn from_dir(dir: &VmDir) -> Self {
        let pid = dir.pid();
        let status = if pid.is_some() { "running" } else { "stopped" };
        let pid = pid.map_or_else(|| "-".to_string(), |pid| pid.to_string());

        match dir.load_config() {
            Ok(config) => Self {
                name: dir.name(),
                cpus: config.cpus.to_string(),
                memory: format!("{}MiB", config.memory_mib),
                pid,
                status: status.to_string(),
            },
            Err(e) => {
                tracing::warn!(vm = %dir.name(), error = %e, "failed to load vm config");
                Self {
                    name: dir.name(),
                    cpus: "-".to_string(),
                    memory: "-".to_string(),
                    pid,
                    status: "invalid config".to_string(),
                }
            }
        }
    }
}

pub fn execute(_args: ListArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let rows: Vec<VmRow> = global
        .options()
        .vm_dirs()?
        .iter()
        .map(VmRow::from_dir)
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::blank());
    println!("{}", table);
    Ok(())
}
