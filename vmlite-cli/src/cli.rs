use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};
use vmlite::runtime::VmliteOptions;

use crate::commands::{
    completion::{CompleteArgs, CompletionArgs},
    create::CreateArgs,
    edit::EditArgs,
    list::ListArgs,
    run::RunArgs,
    stop::StopArgs,
};

#[derive(Parser, Debug)]
#[command(name = "vmlite", author, version)]
#[command(about = "Manage lightweight virtual machines")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
#[command(arg_required_else_help(true))]
pub enum Command {
    /// Create a VM from a hypervisor command line
    Create(CreateArgs),
    /// Run a VM until it stops
    Run(RunArgs),
    /// Stop a running VM
    Stop(StopArgs),
    /// List VMs and their status
    #[command(name = "ls", visible_alias = "list")]
    List(ListArgs),
    /// Change the resources of a stopped VM
    Edit(EditArgs),
    /// Generate a shell completion script
    Completion(CompletionArgs),
    /// Print completion candidates, used by completion scripts
    #[command(name = "_complete", hide = true)]
    Complete(CompleteArgs),
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalFlags {
    /// vmlite home directory (default: ~/.vmlite)
    #[arg(long, global = true, env = "VMLITE_HOME", value_hint = ValueHint::DirPath)]
    pub home: Option<PathBuf>,
}

impl GlobalFlags {
    pub fn options(&self) -> VmliteOptions {
        match &self.home {
            Some(home) => VmliteOptions::new(home),
            None => VmliteOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "vmlite", "--home", "/tmp/vl", "create", "debian", "--cpus", "2", "--", "qemu",
            "-nographic",
        ])
        .unwrap();

        assert_eq!(cli.global.home, Some(PathBuf::from("/tmp/vl")));
        match cli.command {
            Command::Create(args) => {
                assert_eq!(args.name, "debian");
                assert_eq!(args.cpus, 2);
                assert_eq!(args.command, vec!["qemu", "-nographic"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_edit() {
        let cli =
            Cli::try_parse_from(["vmlite", "edit", "debian", "--memory", "2048"]).unwrap();
        match cli.command {
            Command::Edit(args) => {
                assert_eq!(args.name, "debian");
                assert_eq!(args.cpus, None);
                assert_eq!(args.memory, Some(2048));
                assert_eq!(args.grace_period, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_complete_is_hidden() {
        let command = Cli::command();
        let complete = command.find_subcommand("_complete").unwrap();
        assert!(complete.is_hide_set());
    }

    #[test]
    fn test_home_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["vmlite", "ls", "--home", "/tmp/vl"]).unwrap();
        assert_eq!(cli.global.options().home_dir, PathBuf::from("/tmp/vl"));
    }
}
