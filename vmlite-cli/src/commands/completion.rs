use std::io;

use anyhow::Context;
use clap::{Args, CommandFactory};
use clap_complete::{Shell, generate};

use crate::cli::Cli;

const BIN_NAME: &str = "vmlite";

/// Subcommands whose first argument is an existing VM name.
const VM_NAME_SUBCOMMANDS: [&str; 3] = ["run", "stop", "edit"];

#[derive(Args, Debug)]
pub struct CompletionArgs {
    /// Shell to generate for (default: from $SHELL)
    #[arg(value_enum)]
    pub shell: Option<Shell>,
}

/// Print a completion script for `shell` to stdout.
pub fn execute(args: CompletionArgs) -> anyhow::Result<()> {
    let shell = match args.shell {
        Some(shell) => shell,
        None => Shell::from_env().context("unknown shell, pass one explicitly")?,
    };
    generate(shell, &mut Cli::command(), BIN_NAME, &mut io::stdout());

    // Only fish gets dynamic VM names; other shells fall back to files.
    if matches!(shell, Shell::Fish) {
        for line in fish_vm_name_completions() {
            println!("{}", line);
        }
    }
    Ok(())
}

fn fish_vm_name_completions() -> Vec<String> {
    VM_NAME_SUBCOMMANDS
        .iter()
        .map(|subcommand| {
            format!(
                r#"complete -c {bin} -x -n "__fish_seen_subcommand_from {subcommand}" -a "({bin} _complete vm_name)""#,
                bin = BIN_NAME,
                subcommand = subcommand,
            )
        })
        .collect()
}

#[derive(Args, Debug)]
pub struct CompleteArgs {
    /// Kind of value to complete
    pub kind: String,
}

/// Print candidate values for shell completion scripts.
///
/// Unknown kinds print nothing so that a stale script stays quiet.
pub fn complete(args: CompleteArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    if args.kind == "vm_name" {
        for dir in global.options().vm_dirs()? {
            println!("{}\tvm", dir.name());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fish_lines_cover_vm_subcommands() {
        let lines = fish_vm_name_completions();
        assert_eq!(lines.len(), VM_NAME_SUBCOMMANDS.len());
        assert!(lines[0].contains("__fish_seen_subcommand_from run"));
        assert!(lines.iter().all(|l| l.ends_with(r#"-a "(vmlite _complete vm_name)""#)));
    }
}
