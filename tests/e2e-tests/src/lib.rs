// E2E test helpers for childpipe

use childpipe_common::{HandleId, StreamKind};
use childpipe_process::{quote_command_line, ProcessTable};
use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Locate a binary built into the same target directory as this test.
fn target_binary(name: &str) -> PathBuf {
    let mut path = env::current_exe()
        .expect("Failed to get current exe path")
        .parent()
        .expect("Failed to get parent dir")
        .to_path_buf();

    // If we're in deps/, go up one level
    if path.ends_with("deps") {
        path.pop();
    }

    path.push(format!("{}{}", name, env::consts::EXE_SUFFIX));

    if !path.exists() {
        panic!("{} binary not found at: {}", name, path.display());
    }

    path
}

/// Get the path to the TESTEXE (testexe) binary
pub fn get_testexe_path() -> PathBuf {
    match option_env!("CARGO_BIN_EXE_testexe") {
        Some(path) => PathBuf::from(path),
        None => target_binary("testexe"),
    }
}

/// Get the path to the childpipe CLI binary
pub fn get_childpipe_path() -> PathBuf {
    target_binary("childpipe")
}

/// Run the childpipe CLI to completion, feeding `input` on its stdin.
pub fn run_childpipe(args: &[&str], input: &[u8]) -> Output {
    let mut child = Command::new(get_childpipe_path())
        .args(args)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start childpipe");

    // Dropping stdin after the write gives the CLI its EOF.
    let mut stdin = child.stdin.take().expect("stdin was piped");
    if let Err(e) = stdin.write_all(input) {
        // The CLI may exit without draining its input.
        assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe, "Failed to feed childpipe stdin: {}", e);
    }
    drop(stdin);

    child.wait_with_output().expect("Failed to wait for childpipe")
}

/// Command line running testexe with the given script steps.
pub fn testexe_command_line(steps: &[&str]) -> String {
    let exe = get_testexe_path();
    let mut args = vec![exe.to_string_lossy().into_owned()];
    args.extend(steps.iter().map(|s| s.to_string()));
    quote_command_line(&args)
}

/// Launch testexe with plain pipes and assert the launch worked.
pub fn spawn_testexe(table: &ProcessTable, steps: &[&str]) -> HandleId {
    let handle = table.create_process(&testexe_command_line(steps), None, None, None);
    assert_eq!(table.get_last_error(handle), "", "testexe failed to launch");
    handle
}

/// Write all of `data` to stdin, looping over partial writes.
pub fn write_all(table: &ProcessTable, handle: HandleId, data: &[u8]) {
    let mut sent = 0usize;
    while sent < data.len() {
        let n = table.write_stdin(handle, data, sent as i64, (data.len() - sent) as i64);
        assert!(
            n > 0,
            "write_stdin returned {} after {} bytes: {}",
            n,
            sent,
            table.get_last_error(handle)
        );
        sent += n as usize;
    }
}

fn read_once(table: &ProcessTable, handle: HandleId, stream: StreamKind, buf: &mut [u8], offset: usize) -> i64 {
    let length = (buf.len() - offset) as i64;
    match stream {
        StreamKind::Stdout => table.read_stdout(handle, buf, offset as i64, length),
        StreamKind::Stderr => table.read_stderr(handle, buf, offset as i64, length),
        StreamKind::Stdin => panic!("stdin is not readable"),
    }
}

/// Read exactly `count` bytes from a stream, looping over partial reads.
pub fn read_exact(table: &ProcessTable, handle: HandleId, stream: StreamKind, count: usize) -> Vec<u8> {
    let mut buf = vec![0u8; count];
    let mut filled = 0usize;
    while filled < count {
        let n = read_once(table, handle, stream, &mut buf, filled);
        assert!(
            n > 0,
            "{} read returned {} after {} of {} bytes: {}",
            stream,
            n,
            filled,
            count,
            table.get_last_error(handle)
        );
        filled += n as usize;
    }
    buf
}

/// Read until the stream reports end of data.
pub fn read_to_end(table: &ProcessTable, handle: HandleId, stream: StreamKind) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = read_once(table, handle, stream, &mut buf, 0);
        if n < 0 {
            assert_eq!(table.get_last_error(handle), "", "{} read failed", stream);
            return out;
        }
        out.extend_from_slice(&buf[..n as usize]);
    }
}
