use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use thiserror::Error;
use tracing::debug;

use crate::backends::smtlib_printer::{declaration_to_smtlib, symbol, to_smtlib};
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Cvc5Error {
    #[error("cvc5 I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cvc5 not found: {0}")]
    NotFound(String),
    #[error("cvc5 error: {0}")]
    SolverError(String),
    #[error("Failed to parse cvc5 output: {0}")]
    ParseError(String),
}

/// An SMT-LIB2 solver driven over stdin/stdout, `cvc5` by default.
pub struct Cvc5Solver {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    /// Last line the solver wrote to stderr.
    stderr_tail: Arc<Mutex<String>>,
    vars: HashMap<String, SmtSort>,
}

const DEFAULT_COMMAND: &str = "cvc5";

fn pipe<T>(handle: Option<T>, name: &str) -> Result<T, Cvc5Error> {
    handle.ok_or_else(|| Cvc5Error::SolverError(format!("cvc5 {name} was not captured")))
}

impl Cvc5Solver {
    pub fn new() -> Result<Self, Cvc5Error> {
        Self::spawn(DEFAULT_COMMAND, None)
    }

    /// Per-query limit of `timeout_secs`; 0 means none.
    pub fn with_timeout_secs(timeout_secs: u64) -> Result<Self, Cvc5Error> {
        let limit = (timeout_secs > 0).then(|| timeout_secs.saturating_mul(1000));
        Self::spawn(DEFAULT_COMMAND, limit)
    }

    /// Drive another SMT-LIB2 solver that accepts cvc5's flags.
    pub fn with_command(cmd: &str) -> Result<Self, Cvc5Error> {
        Self::spawn(cmd, None)
    }

    pub fn spawn(cmd: &str, limit_ms: Option<u64>) -> Result<Self, Cvc5Error> {
        let mut command = Command::new(cmd);
        command.args(["--lang", "smt2", "--incremental", "--produce-models"]);
        if let Some(ms) = limit_ms {
            command.arg(format!("--tlimit-per={ms}"));
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Cvc5Error::NotFound(format!("{cmd}: {e}")))?;

        let stdin = pipe(child.stdin.take(), "stdin")?;
        let stdout = BufReader::new(pipe(child.stdout.take(), "stdout")?);
        let stderr = pipe(child.stderr.take(), "stderr")?;
        let stderr_tail = Arc::new(Mutex::new(String::new()));
        let tail = Arc::clone(&stderr_tail);
        // Drained continuously so a chatty solver never blocks on a full pipe.
        thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                debug!(line = %line, "cvc5 stderr");
                if let Ok(mut last) = tail.lock() {
                    *last = line;
                }
            }
        });
        let mut solver = Self {
            child,
            stdin,
            stdout,
            stderr_tail,
            vars: HashMap::new(),
        };
        solver.send("(set-logic ALL)")?;
        Ok(solver)
    }

    /// Write one command that produces no output.
    fn send(&mut self, cmd: &str) -> Result<(), Cvc5Error> {
        debug!(command = cmd, "cvc5 <-");
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Write one command and read its balanced response, which may span lines.
    fn query(&mut self, cmd: &str) -> Result<String, Cvc5Error> {
        self.send(cmd)?;
        let mut response = String::new();
        while self.stdout.read_line(&mut response)? > 0 {
            if paren_balance(&response) <= 0 {
                break;
            }
        }
        if response.trim().is_empty() {
            let stderr = self
                .stderr_tail
                .lock()
                .map(|last| last.clone())
                .unwrap_or_default();
            return Err(Cvc5Error::SolverError(format!(
                "no answer to `{cmd}` (stderr: {})",
                stderr.trim()
            )));
        }
        Ok(response.trim_end().to_string())
    }
}

impl Drop for Cvc5Solver {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "(exit)");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
    }
}

impl SmtSolver for Cvc5Solver {
    type Error = Cvc5Error;

    fn declare_sort(&mut self, name: &str) -> Result<(), Cvc5Error> {
        self.send(&format!("(declare-sort {} 0)", symbol(name)))
    }

    fn declare_fun(
        &mut self,
        name: &str,
        domain: &[SmtSort],
        range: &SmtSort,
    ) -> Result<(), Cvc5Error> {
        self.send(&declaration_to_smtlib(name, domain, range))?;
        if domain.is_empty() {
            self.vars.insert(name.to_string(), range.clone());
        }
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Cvc5Error> {
        self.send(&format!("(assert {})", to_smtlib(term)))
    }

    fn push(&mut self) -> Result<(), Cvc5Error> {
        self.send("(push 1)")
    }

    fn pop(&mut self) -> Result<(), Cvc5Error> {
        self.send("(pop 1)")
    }

    fn check_sat(&mut self) -> Result<SatResult, Cvc5Error> {
        let response = self.query("(check-sat)")?;
        match response.as_str() {
            "sat" => Ok(SatResult::Sat),
            "unsat" => Ok(SatResult::Unsat),
            "unknown" => {
                let reason = self
                    .query("(get-info :reason-unknown)")
                    .ok()
                    .and_then(|r| reason_unknown(&r))
                    .unwrap_or_else(|| "cvc5 returned unknown".into());
                Ok(SatResult::Unknown(reason))
            }
            other => Err(Cvc5Error::SolverError(other.to_string())),
        }
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Cvc5Error> {
        let result = self.check_sat()?;
        if result != SatResult::Sat {
            return Ok((result, None));
        }

        let mut values = BTreeMap::new();
        for &(name, sort) in var_names {
            // Only constants declared on this solver have a value.
            if !self.vars.contains_key(name) {
                continue;
            }
            let response = self.query(&format!("(get-value ({}))", symbol(name)))?;
            let value = parse_value(&response, sort)
                .ok_or_else(|| Cvc5Error::ParseError(response.clone()))?;
            values.insert(name.to_string(), value);
        }
        Ok((SatResult::Sat, Some(Model { values })))
    }

    fn reset(&mut self) -> Result<(), Cvc5Error> {
        self.send("(reset)")?;
        self.send("(set-logic ALL)")?;
        self.vars.clear();
        Ok(())
    }
}

fn paren_balance(text: &str) -> i64 {
    let mut depth = 0i64;
    let mut in_quoted_symbol = false;
    for ch in text.chars() {
        match ch {
            '|' => in_quoted_symbol = !in_quoted_symbol,
            '(' if !in_quoted_symbol => depth += 1,
            ')' if !in_quoted_symbol => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// The reason in a `(:reason-unknown reason)` response.
fn reason_unknown(response: &str) -> Option<String> {
    let reason = response
        .trim()
        .strip_prefix("(:reason-unknown")?
        .strip_suffix(')')?
        .trim();
    (!reason.is_empty()).then(|| reason.to_string())
}

/// Extract the value part of a `((name value))` response.
fn value_text(response: &str) -> Option<&str> {
    let inner = response.trim().strip_prefix("((")?.strip_suffix("))")?.trim();
    // Skip the (possibly |quoted|) symbol.
    let rest = if let Some(quoted) = inner.strip_prefix('|') {
        let end = quoted.find('|')?;
        &quoted[end + 1..]
    } else {
        let end = inner.find(char::is_whitespace)?;
        &inner[end..]
    };
    Some(rest.trim())
}

/// Parse a `((name value))` answer to `get-value` at `sort`.
fn parse_value(response: &str, sort: &SmtSort) -> Option<ModelValue> {
    let text = value_text(response)?;
    match sort {
        SmtSort::Int => match text.strip_prefix("(- ").and_then(|s| s.strip_suffix(')')) {
            Some(magnitude) => magnitude.trim().parse::<i64>().ok().map(|n| ModelValue::Int(-n)),
            None => text.parse::<i64>().ok().map(ModelValue::Int),
        },
        SmtSort::Bool => match text {
            "true" => Some(ModelValue::Bool(true)),
            "false" => Some(ModelValue::Bool(false)),
            _ => None,
        },
        // Abstract values come back as `(as @a0 node)` or a bare `@node_0`.
        SmtSort::Uninterpreted(_) => {
            let element = text
                .strip_prefix("(as ")
                .and_then(|s| s.split_whitespace().next())
                .unwrap_or(text);
            Some(ModelValue::Element(element.to_string()))
        }
    }
}
