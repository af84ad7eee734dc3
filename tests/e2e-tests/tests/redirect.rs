//! Append-mode file redirection of stdout and stderr.

use childpipe_common::StreamKind;
use childpipe_process::ProcessTable;
use e2e_tests::{read_to_end, testexe_command_line};
use std::fs;

#[test]
fn test_redirect_to_separate_files() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("stdout.txt");
    let err = dir.path().join("stderr.txt");
    let table = ProcessTable::default();

    let h = table.create_process(
        &testexe_command_line(&["O-to stdout", "E-to stderr"]),
        None,
        Some(out.as_path()),
        Some(err.as_path()),
    );
    assert_eq!(table.get_last_error(h), "");
    assert_eq!(table.wait_for(h), 0);
    table.dispose(h);

    assert_eq!(fs::read_to_string(&out).unwrap(), "to stdout");
    assert_eq!(fs::read_to_string(&err).unwrap(), "to stderr");
}

#[test]
fn test_redirect_both_to_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("both.txt");
    let table = ProcessTable::default();

    let h = table.create_process(
        &testexe_command_line(&["O-one", "E-two", "O-three"]),
        None,
        Some(file.as_path()),
        Some(file.as_path()),
    );
    assert_eq!(table.wait_for(h), 0);
    table.dispose(h);

    assert_eq!(fs::read_to_string(&file).unwrap(), "onetwothree");
}

#[test]
fn test_redirect_appends_to_existing_content() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("append.txt");
    fs::write(&file, "out1").unwrap();
    let table = ProcessTable::default();

    let h = table.create_process(&testexe_command_line(&["O-out2"]), None, Some(file.as_path()), None);
    assert_eq!(table.wait_for(h), 0);
    table.dispose(h);

    assert_eq!(fs::read_to_string(&file).unwrap(), "out1out2");
}

#[test]
fn test_reading_redirected_stream_fails_distinctly() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("redirected.txt");
    let table = ProcessTable::default();

    let h = table.create_process(
        &testexe_command_line(&["O-file", "E-pipe"]),
        None,
        Some(file.as_path()),
        None,
    );
    let mut buf = [0u8; 8];
    assert_eq!(table.read_stdout(h, &mut buf, 0, 8), -1);
    assert_eq!(table.get_last_error(h), "");

    // The other stream is still a pipe.
    assert_eq!(read_to_end(&table, h, StreamKind::Stderr), b"pipe");
    assert_eq!(table.wait_for(h), 0);
    table.dispose(h);

    assert_eq!(fs::read_to_string(&file).unwrap(), "file");
}

#[test]
fn test_unwritable_redirect_target() {
    let dir = tempfile::tempdir().unwrap();
    let missing_dir = dir.path().join("no-such-dir").join("out.txt");
    let table = ProcessTable::default();

    let h = table.create_process(&testexe_command_line(&["O-x"]), None, Some(missing_dir.as_path()), None);
    let error = table.get_last_error(h);
    assert!(error.starts_with("Cannot open redirect target"), "{}", error);
    assert_eq!(table.pid(h), -1);
    table.dispose(h);
}
