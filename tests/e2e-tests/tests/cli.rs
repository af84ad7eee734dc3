//! The childpipe command-line front end.

use e2e_tests::{get_testexe_path, run_childpipe};
use std::fs;

fn testexe() -> String {
    get_testexe_path().to_string_lossy().into_owned()
}

#[test]
fn test_quote_prints_command_line() {
    let output = run_childpipe(&["quote", "a", "b c", ""], b"");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "a \"b c\" \"\"\n");
}

#[test]
fn test_run_relays_stdin_stdout_and_exit_status() {
    let exe = testexe();
    let output = run_childpipe(&["run", "--", &exe, "Ia3", "Oa", "X4"], b"abc");

    assert_eq!(output.stdout, b"abc");
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_run_relays_stderr() {
    let exe = testexe();
    let output = run_childpipe(&["run", "--", &exe, "O-out", "E-err"], b"");

    assert!(output.status.success());
    assert_eq!(output.stdout, b"out");
    assert!(String::from_utf8_lossy(&output.stderr).contains("err"));
}

#[test]
fn test_run_adds_env_to_inherited_environment() {
    let exe = testexe();
    let output = run_childpipe(&["run", "--env", "ONE=1", "-e", "TWO=2", "--", &exe, "O$ONE", "O$TWO", "O$RUST_LOG"], b"");
    assert!(output.status.success());
    assert_eq!(output.stdout, b"12warn");
}

#[cfg(unix)]
#[test]
fn test_run_with_cleared_environment() {
    let exe = testexe();
    let output = run_childpipe(&["run", "--clear-env", "--env", "ONE=1", "--", &exe, "O$ONE", "O$PATH"], b"");
    assert!(output.status.success());
    assert_eq!(output.stdout, b"1");
}

#[test]
fn test_run_rejects_malformed_env_option() {
    let exe = testexe();
    let output = run_childpipe(&["run", "--env", "NOEQUALS", "--", &exe], b"");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("expected KEY=VALUE"));
}

#[test]
fn test_run_appends_to_redirect_files() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");
    let err = dir.path().join("err.txt");
    fs::write(&out, "old|").unwrap();
    let out_arg = out.to_string_lossy().into_owned();
    let err_arg = err.to_string_lossy().into_owned();
    let exe = testexe();

    let output = run_childpipe(
        &["run", "--stdout", &out_arg, "--stderr", &err_arg, "--", &exe, "O-new", "E-oops", "X2"],
        b"",
    );
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(output.stdout, b"");
    assert_eq!(fs::read_to_string(&out).unwrap(), "old|new");
    assert_eq!(fs::read_to_string(&err).unwrap(), "oops");
}

#[test]
fn test_run_reports_launch_failure() {
    let output = run_childpipe(&["run", "--", "ThisExecutableDoesNotExist"], b"");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to launch"), "{}", stderr);
    assert!(stderr.contains("ThisExecutableDoesNotExist"), "{}", stderr);
}
