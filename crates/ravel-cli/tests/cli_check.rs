use std::process::{Command, Output};

fn demo(name: &str) -> String {
    format!("{}/../../demos/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn ravel(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ravel"))
        .args(args)
        .output()
        .expect("failed to execute ravel")
}

#[test]
fn exhausted_bound_exits_zero_and_prints_progress() {
    let output = ravel(&["check", &demo("counter.json"), "--bound", "1"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Checking invariants at depth 0..."));
    assert!(stdout.contains("Checking invariants at depth 1..."));
    assert!(!stdout.contains("depth 2..."));
    assert!(stdout.contains("No violation found within bound 1."));
}

#[test]
fn counterexample_exits_one_with_a_trace() {
    let output = ravel(&["check", &demo("lock_server_buggy.json"), "--bound", "4"]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("found a counterexample at depth 2"));
    assert!(stdout.contains("Counterexample trace:"));
    assert!(stdout.contains("Violated: mutual_exclusion"));
    assert!(stdout.contains("ext (grant)"));
}

#[test]
fn json_output_is_a_single_document() {
    let output = ravel(&[
        "check",
        &demo("initialize.json"),
        "--bound",
        "0",
        "--format",
        "json",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(value["schema_version"], 1);
    assert_eq!(value["solver"], "z3");
    assert_eq!(value["result"]["verdict"], "violation");
    assert_eq!(value["result"]["depth"], 0);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Checking invariants at depth 0..."));
}

#[test]
fn dump_smt_writes_every_query() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queries.smt2");
    let path_str = path.to_string_lossy().into_owned();
    let output = ravel(&[
        "check",
        &demo("lock_server.json"),
        "--bound",
        "2",
        "--dump-smt",
        &path_str,
    ]);
    assert_eq!(output.status.code(), Some(0));
    let dump = std::fs::read_to_string(&path).unwrap();
    assert_eq!(dump.matches("(check-sat)").count(), 3);
    assert!(dump.contains("(declare-sort node 0)"));
}

#[test]
fn report_all_and_fresh_contexts_agree() {
    let output = ravel(&[
        "check",
        &demo("lock_server_buggy.json"),
        "--report-all",
        "--no-incremental",
        "--on-unknown",
        "continue",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("found a counterexample at depth 2"));
}

#[test]
fn missing_file_is_an_input_error() {
    let output = ravel(&["check", "does/not/exist.json"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn malformed_program_is_an_input_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"name": "bad", "signature": {}, "exported": ["ghost"]}"#).unwrap();
    let path_str = path.to_string_lossy().into_owned();

    let check = ravel(&["check", &path_str]);
    assert_eq!(check.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&check.stderr);
    assert!(stderr.contains("ghost"), "stderr: {stderr}");

    let validate = ravel(&["validate", &path_str]);
    assert_eq!(validate.status.code(), Some(3));
}

#[test]
fn bad_arguments_do_not_masquerade_as_verdicts() {
    let unknown_solver = ravel(&["check", &demo("counter.json"), "--solver", "yices"]);
    assert_eq!(unknown_solver.status.code(), Some(3));
    let unknown_flag = ravel(&["check", &demo("counter.json"), "--depth", "3"]);
    assert_eq!(unknown_flag.status.code(), Some(3));
}

#[test]
fn validate_prints_a_summary() {
    let output = ravel(&["validate", &demo("lock_server.json")]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Program 'lock_server' is valid."));
}

#[test]
fn help_succeeds() {
    let output = ravel(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("check"));
    assert!(stdout.contains("validate"));
}
