//! sm - inspect and edit semantic models from the command line

use clap::Parser;

mod cli;
mod commands;
mod model_file;
mod object_path;

use cli::{Cli, Commands};
use commands::{common, delete, deps, errors, export, refs, rename};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Deps(args) => deps::execute(args, &cli.global),
        Commands::Refs(args) => refs::execute(args, &cli.global),
        Commands::Rename(args) => rename::execute(args, &cli.global),
        Commands::Delete(args) => delete::execute(args, &cli.global),
        Commands::Errors(args) => errors::execute(args, &cli.global),
        Commands::Export(args) => export::execute(args, &cli.global),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<common::ExitCode>() {
            Some(code) => std::process::ExitCode::from(code.0),
            None => {
                eprintln!("Error: {:#}", err);
                std::process::ExitCode::FAILURE
            }
        },
    }
}
