//! `ravel validate`.

use std::path::PathBuf;

use miette::IntoDiagnostic;
use ravel_ir::{program::INITIALIZER, Program};
use serde_json::json;

use super::helpers::{load_program_file, parse_output_format, OutputFormat};

pub(crate) fn run_validate_command(file: PathBuf, format: String) -> miette::Result<()> {
    let output_format = parse_output_format(&format)?;
    let program = load_program_file(&file)?;
    program.validate().into_diagnostic()?;

    match output_format {
        OutputFormat::Json => {
            let artifact = json!({
                "schema_version": 1,
                "file": file.display().to_string(),
                "program": program.name,
                "valid": true,
                "sorts": program.signature.sorts.iter().collect::<Vec<_>>(),
                "state_symbols": program.signature.state_symbols().map(|(n, _)| n).collect::<Vec<_>>(),
                "actions": program.actions.iter().map(|a| &a.name).collect::<Vec<_>>(),
                "exported": program.exported,
                "conjectures": program.conjectures.iter().map(|c| &c.name).collect::<Vec<_>>(),
                "has_initializer": program.initializer().is_some(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&artifact).into_diagnostic()?
            );
        }
        OutputFormat::Text => print!("{}", render_summary(&program)),
    }
    Ok(())
}

fn render_summary(program: &Program) -> String {
    let sig = &program.signature;
    let state = sig.state_symbols().count();
    let mut out = format!("Program '{}' is valid.\n", program.name);
    out.push_str(&format!("  Sorts: {}\n", sig.sorts.len()));
    out.push_str(&format!(
        "  Symbols: {} ({state} state, {} rigid)\n",
        sig.symbols.len(),
        sig.symbols.len() - state
    ));
    out.push_str(&format!(
        "  Actions: {} ({} exported: {})\n",
        program.actions.len(),
        program.exported.len(),
        program.exported.join(", ")
    ));
    if program.initializer().is_some() {
        out.push_str(&format!("  Runs '{INITIALIZER}' before the first check\n"));
    }
    out.push_str(&format!("  Conjectures: {}\n", program.conjectures.len()));
    for c in &program.conjectures {
        out.push_str(&format!("    - {}\n", c.name));
    }
    out
}
