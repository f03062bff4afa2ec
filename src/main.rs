use clap::Parser;
use foldersense::cli::{Cli, Command, run_cli};
use foldersense::output::OutputFormatter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => match run_cli(&args) {
            Ok(outcome) => ExitCode::from(outcome.exit_code()),
            Err(e) => {
                OutputFormatter::error(&format!("Error: {}", e));
                ExitCode::from(e.exit_code())
            }
        },
    }
}
