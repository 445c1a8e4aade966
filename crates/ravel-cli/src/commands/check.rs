//! `ravel check`.

use std::path::PathBuf;
use std::process::ExitCode;

use miette::IntoDiagnostic;
use ravel_engine::bmc::{BmcEvent, BmcOutcome};
use ravel_engine::counterexample::format_counterexample;
use ravel_engine::pipeline::{self, PipelineOptions};
use serde_json::json;
use tracing::info;

use super::helpers::{
    load_program_file, outcome_exit_code, parse_output_format, parse_solver_choice,
    parse_unknown_policy, solver_name, OutputFormat,
};

/// Run bounded model checking on a program file and report the verdict.
#[allow(clippy::too_many_arguments)]
pub(crate) fn run_check_command(
    file: PathBuf,
    bound: usize,
    solver: String,
    timeout: u64,
    format: String,
    dump_smt: Option<String>,
    report_all: bool,
    no_incremental: bool,
    on_unknown: String,
) -> miette::Result<ExitCode> {
    let output_format = parse_output_format(&format)?;
    let options = PipelineOptions {
        solver: parse_solver_choice(&solver)?,
        bound,
        timeout_secs: timeout,
        dump_smt,
        report_first: !report_all,
        incremental: !no_incremental,
        unknown_policy: parse_unknown_policy(&on_unknown)?,
    };
    let program = load_program_file(&file)?;
    let filename = file.display().to_string();
    info!(file = %filename, "loaded program");

    let outcome = pipeline::check_with_observer(&program, &options, |event| {
        if let BmcEvent::DepthStarted(depth) = event {
            // Keep stdout parseable in JSON mode.
            match output_format {
                OutputFormat::Text => println!("Checking invariants at depth {depth}..."),
                OutputFormat::Json => eprintln!("Checking invariants at depth {depth}..."),
            }
        }
    })
    .into_diagnostic()?;

    match output_format {
        OutputFormat::Json => {
            let artifact = json!({
                "schema_version": 1,
                "file": filename,
                "program": program.name,
                "solver": solver_name(options.solver),
                "bound": bound,
                "result": outcome,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&artifact).into_diagnostic()?
            );
        }
        OutputFormat::Text => print!("{}", render_outcome_text(&outcome, bound)),
    }
    if let Some(ref path) = options.dump_smt {
        if matches!(output_format, OutputFormat::Text) {
            println!("SMT queries written to {path}");
        }
    }
    Ok(ExitCode::from(outcome_exit_code(&outcome)))
}

fn render_outcome_text(outcome: &BmcOutcome, bound: usize) -> String {
    match outcome {
        BmcOutcome::Violation {
            depth,
            counterexample,
        } => format!(
            "BMC with bound {bound} found a counterexample at depth {depth}.\n\n{}",
            format_counterexample(counterexample)
        ),
        BmcOutcome::Exhausted {
            bound,
            inconclusive_depths,
        } => {
            let mut out = format!(
                "No violation found within bound {bound}. This is not a proof of safety.\n"
            );
            if !inconclusive_depths.is_empty() {
                let depths: Vec<String> =
                    inconclusive_depths.iter().map(|d| d.to_string()).collect();
                out.push_str(&format!(
                    "The solver could not decide depths {}.\n",
                    depths.join(", ")
                ));
            }
            out
        }
        BmcOutcome::Inconclusive { depth, reason } => {
            format!("Inconclusive at depth {depth}: {reason}\n")
        }
    }
}
