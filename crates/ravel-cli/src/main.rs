#![doc = include_str!("../README.md")]

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::helpers::ERROR_EXIT;

fn run(cli: Cli) -> miette::Result<ExitCode> {
    match cli.command {
        Commands::Check {
            file,
            bound,
            solver,
            timeout,
            format,
            dump_smt,
            report_all,
            no_incremental,
            on_unknown,
        } => commands::check::run_check_command(
            file,
            bound,
            solver,
            timeout,
            format,
            dump_smt,
            report_all,
            no_incremental,
            on_unknown,
        ),
        Commands::Validate { file, format } => {
            commands::validate::run_validate_command(file, format)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    // Initialize tracing; progress lines go to stdout, so stay quiet by default.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Exit codes 1 and 2 carry verdicts, so argument errors must not use them.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(ERROR_EXIT)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            ExitCode::from(ERROR_EXIT)
        }
    }
}
