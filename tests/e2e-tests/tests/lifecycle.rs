//! Launch failures, exit codes, interruption, termination and disposal.

use childpipe_common::{HandleId, StreamKind};
use childpipe_process::{api, process_exists, ProcessTable, TableConfig};
use e2e_tests::{read_exact, read_to_end, spawn_testexe, testexe_command_line, write_all};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn test_executable_not_found() {
    let table = ProcessTable::default();
    let h = table.create_process("ThisExecutableDoesNotExist", None, None, None);

    let error = table.get_last_error(h);
    assert!(!error.is_empty());
    assert!(error.contains("ThisExecutableDoesNotExist"), "{}", error);
    #[cfg(unix)]
    assert!(error.contains("No such file or directory"), "{}", error);
    #[cfg(windows)]
    assert!(error.contains("cannot find the file"), "{}", error);

    table.dispose(h);
}

#[test]
fn test_operations_after_failed_launch() {
    let table = ProcessTable::default();
    let h = table.create_process("ThisExecutableDoesNotExist", None, None, None);
    let error = table.get_last_error(h);

    let mut buf = [0u8; 3];
    assert_eq!(table.write_stdin(h, &buf, 0, 3), -1);
    assert_eq!(table.read_stdout(h, &mut buf, 0, 3), -1);
    assert_eq!(table.read_stderr(h, &mut buf, 0, 3), -1);
    assert_eq!(table.wait_for(h), -1);
    assert_eq!(table.get_last_error(h), error);

    table.dispose(h);
}

#[test]
fn test_exit_code() {
    let table = ProcessTable::default();
    let h = spawn_testexe(&table, &["X42"]);
    assert_eq!(table.wait_for(h), 42);
    assert_eq!(table.exit_code(h), Some(42));
    // Waiting again reports the same code.
    assert_eq!(table.wait_for(h), 42);
    table.dispose(h);
}

#[test]
fn test_interrupt_wait() {
    let table = Arc::new(ProcessTable::default());
    let h = spawn_testexe(&table, &["S60000"]);
    let pid = table.pid(h);
    assert!(pid > 0);
    assert!(!table.is_interrupted(h));

    let waiter = {
        let table = Arc::clone(&table);
        thread::spawn(move || table.wait_for(h))
    };
    thread::sleep(Duration::from_millis(100));
    table.interrupt(h);

    assert_eq!(waiter.join().unwrap(), -1);
    assert!(table.is_interrupted(h));
    assert_eq!(table.exit_code(h), None);
    // Interruption does not kill the child.
    assert!(process_exists(pid as u32).unwrap());

    assert!(table.terminate(h));
    table.dispose(h);
}

#[test]
fn test_interrupt_before_wait() {
    let table = ProcessTable::default();
    let h = spawn_testexe(&table, &["S60000"]);

    table.interrupt(h);
    table.interrupt(h);
    assert!(table.is_interrupted(h));
    assert_eq!(table.wait_for(h), -1);

    assert!(table.terminate(h));
    table.dispose(h);
}

#[test]
fn test_exit_wins_over_pending_interrupt() {
    let table = ProcessTable::default();
    let h = spawn_testexe(&table, &["O-done", "X7"]);

    // EOF on stdout means the child is on its way out.
    assert_eq!(read_to_end(&table, h, StreamKind::Stdout), b"done");
    thread::sleep(Duration::from_millis(200));
    table.interrupt(h);
    assert_eq!(table.wait_for(h), 7);
    table.dispose(h);
}

#[test]
fn test_terminate_unblocks_read() {
    let table = Arc::new(ProcessTable::default());
    let h = spawn_testexe(&table, &["S60000"]);

    let reader = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            let mut buf = [0u8; 16];
            table.read_stdout(h, &mut buf, 0, 16)
        })
    };
    thread::sleep(Duration::from_millis(100));
    assert!(table.terminate(h));

    assert_eq!(reader.join().unwrap(), -1);
    assert_ne!(table.wait_for(h), 0);
    table.dispose(h);
}

#[test]
fn test_terminate_unblocks_write() {
    let table = Arc::new(ProcessTable::default());
    let h = spawn_testexe(&table, &["S60000"]);

    // The child never reads, so the pipe fills and a write blocks.
    let writer = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            let data = vec![0u8; 1 << 20];
            loop {
                let n = table.write_stdin(h, &data, 0, data.len() as i64);
                if n < 0 {
                    return n;
                }
            }
        })
    };
    thread::sleep(Duration::from_millis(200));
    assert!(table.terminate(h));

    assert_eq!(writer.join().unwrap(), -1);
    assert_eq!(table.get_last_error(h), "");
    assert_ne!(table.wait_for(h), 0);
    table.dispose(h);
}

#[test]
fn test_terminate_after_exit_is_harmless() {
    let table = ProcessTable::default();
    let h = spawn_testexe(&table, &["X3"]);
    assert_eq!(table.wait_for(h), 3);
    assert!(table.terminate(h));
    assert_eq!(table.get_last_error(h), "");
    table.dispose(h);
}

#[test]
fn test_dispose() {
    let table = ProcessTable::default();
    let h = spawn_testexe(&table, &["S60000"]);
    let pid = table.pid(h) as u32;
    assert_eq!(table.live_handles(), 1);

    table.dispose(h);
    assert_eq!(table.live_handles(), 0);
    assert!(table.get_last_error(h).contains("Unknown process handle"));

    let mut buf = [0u8; 4];
    assert_eq!(table.read_stdout(h, &mut buf, 0, 4), -1);
    assert_eq!(table.write_stdin(h, &buf, 0, 4), -1);
    assert_eq!(table.wait_for(h), -1);
    assert_eq!(table.pid(h), -1);

    // The reaper collects the killed child shortly after dispose.
    assert!(wait_until(Duration::from_secs(10), || !process_exists(pid).unwrap_or(true)));

    table.dispose(h);
}

#[test]
fn test_dispose_after_exit() {
    let table = ProcessTable::default();
    let h = spawn_testexe(&table, &[]);
    assert_eq!(table.wait_for(h), 0);
    table.dispose(h);
    assert_eq!(table.live_handles(), 0);
}

#[test]
fn test_concurrent_handles() {
    let table = ProcessTable::default();
    thread::scope(|s| {
        for i in 0..8u8 {
            let table = &table;
            s.spawn(move || {
                let h = spawn_testexe(table, &["Ia1", "Oa", "X5"]);
                write_all(table, h, &[b'a' + i]);
                assert_eq!(read_exact(table, h, StreamKind::Stdout, 1), [b'a' + i]);
                assert_eq!(table.wait_for(h), 5);
                table.dispose(h);
            });
        }
    });
    assert_eq!(table.live_handles(), 0);
}

#[test]
fn test_custom_poll_interval() {
    let config = TableConfig::load_from_string("exit_poll_interval: 1ms\n").unwrap();
    let table = ProcessTable::new(config);
    let h = spawn_testexe(&table, &["S50", "X9"]);
    assert_eq!(table.wait_for(h), 9);
    table.dispose(h);
}

#[test]
fn test_default_table_functions() {
    let h: HandleId = api::create_process(&testexe_command_line(&["Ia2", "Oa", "X1"]), None, None, None);
    assert_eq!(api::get_last_error(h), "");
    assert!(api::pid(h) > 0);

    assert_eq!(api::write_stdin(h, b"hi", 0, 2), 2);
    let mut buf = [0u8; 2];
    let mut filled = 0usize;
    while filled < 2 {
        let n = api::read_stdout(h, &mut buf, filled as i64, (2 - filled) as i64);
        assert!(n > 0);
        filled += n as usize;
    }
    assert_eq!(&buf, b"hi");
    assert_eq!(api::wait_for(h), 1);
    assert!(!api::is_interrupted(h));

    api::dispose(h);
    assert!(api::get_last_error(h).contains("Unknown process handle"));
}
