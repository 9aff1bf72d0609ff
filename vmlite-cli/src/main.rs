mod cli;
mod commands;

use clap::Parser;
use vmlite::util::{env_filter_or, init_stderr_logging};
use vmlite_shared::constants::exit_codes;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A background run logs to its own file instead.
    let background = matches!(&cli.command, Command::Run(args) if args.background);
    if !background {
        init_stderr_logging(env_filter_or("info"));
    }

    let result = match cli.command {
        Command::Create(args) => {
            commands::create::execute(args, &cli.global).map(|_| exit_codes::SUCCESS)
        }
        Command::Run(args) => commands::run::execute(args, &cli.global).await,
        Command::Stop(args) => commands::stop::execute(args, &cli.global)
            .await
            .map(|_| exit_codes::SUCCESS),
        Command::List(args) => {
            commands::list::execute(args, &cli.global).map(|_| exit_codes::SUCCESS)
        }
        Command::Edit(args) => {
            commands::edit::execute(args, &cli.global).map(|_| exit_codes::SUCCESS)
        }
        Command::Completion(args) => {
            commands::completion::execute(args).map(|_| exit_codes::SUCCESS)
        }
        Command::Complete(args) => {
            commands::completion::complete(args, &cli.global).map(|_| exit_codes::SUCCESS)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_codes::FAILURE);
        }
    }
}
