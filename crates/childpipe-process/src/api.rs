//! Flat handle API.
//!
//! [`ProcessTable`] is the surface callers outside Rust program against:
//! integer handles, `-1` sentinels and a per-handle last-error string
//! instead of `Result`s. Each operation resolves the handle, runs the typed
//! operation on the record and folds the outcome:
//!
//! | outcome                           | return | last error        |
//! |-----------------------------------|--------|-------------------|
//! | success                           | count  | cleared           |
//! | zero-length window, open stream   | `0`    | cleared           |
//! | EOF / closed / redirected stream  | `-1`   | cleared           |
//! | offset/length contract violation  | `-1`   | unchanged         |
//! | OS failure                        | `-1`   | set               |
//! | handle that failed to spawn       | `-1`   | keeps spawn error |
//!
//! A caller that gets `-1` from a read with an empty last error has reached
//! the end of that stream. The closed-stream row wins over the zero-length
//! row: once a stream is closed every request on it returns `-1`.
//!
//! The free functions at the bottom of this module operate on one
//! process-wide table.

use crate::config::TableConfig;
use crate::launcher::{launch, LaunchRequest};
use crate::pipe_io::checked_range;
use crate::record::ProcessRecord;
use crate::registry::ProcessRegistry;
use crate::wait::WaitOutcome;
use childpipe_common::{HandleId, PipeError, PipeResult, ProcessError, INTERRUPTED_EXIT_CODE};
use lazy_static::lazy_static;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub use crate::cmdline::quote_command_line;

/// Returned by every count-returning operation on failure.
pub const FAILURE: i64 = -1;

/// Registry plus settings, exposed through sentinel-returning operations.
#[derive(Debug, Default)]
pub struct ProcessTable {
    registry: ProcessRegistry,
    config: TableConfig,
}

impl ProcessTable {
    pub fn new(config: TableConfig) -> Self {
        Self {
            registry: ProcessRegistry::new(),
            config,
        }
    }

    /// Launch a process. Always returns a handle; when the launch failed the
    /// handle is inert and [`ProcessTable::get_last_error`] says why.
    pub fn create_process(
        &self,
        command_line: &str,
        environment: Option<&[u8]>,
        stdout_redirect: Option<&Path>,
        stderr_redirect: Option<&Path>,
    ) -> HandleId {
        let request = LaunchRequest {
            command_line,
            environment,
            stdout_redirect,
            stderr_redirect,
        };
        let id = self.registry.allocate();
        let record = self.registry.insert(launch(id, &request));
        debug!(
            "Created handle {} (started: {}, live handles: {})",
            id,
            record.is_started(),
            self.registry.len()
        );
        id
    }

    /// Write `buffer[offset..offset + length]` to stdin.
    pub fn write_stdin(&self, handle: HandleId, buffer: &[u8], offset: i64, length: i64) -> i64 {
        let Some(record) = self.resolve(handle) else {
            return FAILURE;
        };
        let range = match checked_range(buffer.len(), offset, length) {
            Ok(range) => range,
            Err(e) => return contract_violation(handle, e),
        };
        let requested = range.len();
        fold_transfer(&record, requested, record.write_stdin(&buffer[range]))
    }

    /// Read into `buffer[offset..offset + length]` from stdout.
    pub fn read_stdout(&self, handle: HandleId, buffer: &mut [u8], offset: i64, length: i64) -> i64 {
        self.read_with(handle, buffer, offset, length, ProcessRecord::read_stdout)
    }

    /// Read into `buffer[offset..offset + length]` from stderr.
    pub fn read_stderr(&self, handle: HandleId, buffer: &mut [u8], offset: i64, length: i64) -> i64 {
        self.read_with(handle, buffer, offset, length, ProcessRecord::read_stderr)
    }

    /// Block until the process exits (its code) or the wait is interrupted (`-1`).
    pub fn wait_for(&self, handle: HandleId) -> i32 {
        let Some(record) = self.resolve(handle) else {
            return INTERRUPTED_EXIT_CODE;
        };
        match record.wait(self.config.exit_poll_interval) {
            Ok(outcome) => {
                record.clear_last_error();
                if outcome == WaitOutcome::Interrupted {
                    debug!("Handle {}: wait returned early on interrupt", handle);
                }
                outcome.code()
            }
            Err(e) => {
                record_process_error(&record, e);
                INTERRUPTED_EXIT_CODE
            }
        }
    }

    /// Ask a blocked or future [`ProcessTable::wait_for`] to return `-1`.
    pub fn interrupt(&self, handle: HandleId) {
        if let Some(record) = self.resolve(handle) {
            record.interrupt();
        }
    }

    pub fn is_interrupted(&self, handle: HandleId) -> bool {
        self.resolve(handle)
            .map(|record| record.is_interrupted())
            .unwrap_or(false)
    }

    /// Forcibly end the process. `true` if it is now dead.
    pub fn terminate(&self, handle: HandleId) -> bool {
        let Some(record) = self.resolve(handle) else {
            return false;
        };
        match record.terminate() {
            Ok(()) => {
                record.clear_last_error();
                true
            }
            Err(e) => {
                record_process_error(&record, e);
                false
            }
        }
    }

    /// Terminate the process, release its streams and forget the handle.
    /// Disposing an unknown or already disposed handle does nothing.
    pub fn dispose(&self, handle: HandleId) {
        match self.registry.remove(handle) {
            Ok(record) => {
                record.release();
                let age = chrono::Utc::now() - record.started_at();
                info!(
                    "Disposed handle {} ({}, alive {}ms, live handles: {})",
                    handle,
                    record.program(),
                    age.num_milliseconds(),
                    self.registry.len()
                );
            }
            Err(e) => debug!("Dispose ignored: {}", e),
        }
    }

    /// Message of the last failed operation on `handle`; empty after a success.
    pub fn get_last_error(&self, handle: HandleId) -> String {
        match self.registry.lookup(handle) {
            Ok(record) => record.last_error(),
            Err(e) => e.to_string(),
        }
    }

    /// Native process id, or `-1` for unknown and never-started handles.
    pub fn pid(&self, handle: HandleId) -> i64 {
        self.resolve(handle)
            .and_then(|record| record.pid())
            .map(i64::from)
            .unwrap_or(FAILURE)
    }

    /// Close stdin so the child reads EOF.
    pub fn close_stdin(&self, handle: HandleId) -> bool {
        let Some(record) = self.resolve(handle) else {
            return false;
        };
        fold_transfer(&record, 1, record.close_stdin().map(|()| 1)) == 1
    }

    /// Exit code if the exit was already observed. Never blocks.
    pub fn exit_code(&self, handle: HandleId) -> Option<i32> {
        self.resolve(handle).and_then(|record| record.exit_code())
    }

    /// Number of handles not yet disposed.
    pub fn live_handles(&self) -> usize {
        self.registry.len()
    }

    fn read_with(
        &self,
        handle: HandleId,
        buffer: &mut [u8],
        offset: i64,
        length: i64,
        read: fn(&ProcessRecord, &mut [u8]) -> PipeResult<usize>,
    ) -> i64 {
        let Some(record) = self.resolve(handle) else {
            return FAILURE;
        };
        let range = match checked_range(buffer.len(), offset, length) {
            Ok(range) => range,
            Err(e) => return contract_violation(handle, e),
        };
        let requested = range.len();
        fold_transfer(&record, requested, read(&record, &mut buffer[range]))
    }

    fn resolve(&self, handle: HandleId) -> Option<Arc<ProcessRecord>> {
        match self.registry.lookup(handle) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }
}

fn contract_violation(handle: HandleId, error: PipeError) -> i64 {
    debug!("Handle {}: {}", handle, error);
    FAILURE
}

fn fold_transfer(record: &ProcessRecord, requested: usize, result: PipeResult<usize>) -> i64 {
    match result {
        Ok(0) if requested > 0 => {
            record.clear_last_error();
            FAILURE
        }
        Ok(n) => {
            record.clear_last_error();
            i64::try_from(n).unwrap_or(i64::MAX)
        }
        Err(e) => {
            if e.records_last_error() {
                record.set_last_error(e.to_string());
            } else if record.is_started() {
                record.clear_last_error();
            }
            FAILURE
        }
    }
}

fn record_process_error(record: &ProcessRecord, error: ProcessError) {
    // A handle that never started keeps its spawn error.
    if record.is_started() {
        record.set_last_error(error.to_string());
    } else {
        debug!("Handle {}: {}", record.id(), error);
    }
}

lazy_static! {
    static ref DEFAULT_TABLE: ProcessTable = ProcessTable::default();
}

/// The process-wide table behind the free functions.
pub fn default_table() -> &'static ProcessTable {
    &DEFAULT_TABLE
}

pub fn create_process(
    command_line: &str,
    environment: Option<&[u8]>,
    stdout_redirect: Option<&Path>,
    stderr_redirect: Option<&Path>,
) -> HandleId {
    DEFAULT_TABLE.create_process(command_line, environment, stdout_redirect, stderr_redirect)
}

pub fn write_stdin(handle: HandleId, buffer: &[u8], offset: i64, length: i64) -> i64 {
    DEFAULT_TABLE.write_stdin(handle, buffer, offset, length)
}

pub fn read_stdout(handle: HandleId, buffer: &mut [u8], offset: i64, length: i64) -> i64 {
    DEFAULT_TABLE.read_stdout(handle, buffer, offset, length)
}

pub fn read_stderr(handle: HandleId, buffer: &mut [u8], offset: i64, length: i64) -> i64 {
    DEFAULT_TABLE.read_stderr(handle, buffer, offset, length)
}

pub fn wait_for(handle: HandleId) -> i32 {
    DEFAULT_TABLE.wait_for(handle)
}

pub fn interrupt(handle: HandleId) {
    DEFAULT_TABLE.interrupt(handle)
}

pub fn is_interrupted(handle: HandleId) -> bool {
    DEFAULT_TABLE.is_interrupted(handle)
}

pub fn terminate(handle: HandleId) -> bool {
    DEFAULT_TABLE.terminate(handle)
}

pub fn dispose(handle: HandleId) {
    DEFAULT_TABLE.dispose(handle)
}

pub fn get_last_error(handle: HandleId) -> String {
    DEFAULT_TABLE.get_last_error(handle)
}

pub fn pid(handle: HandleId) -> i64 {
    DEFAULT_TABLE.pid(handle)
}

pub fn close_stdin(handle: HandleId) -> bool {
    DEFAULT_TABLE.close_stdin(handle)
}

pub fn exit_code(handle: HandleId) -> Option<i32> {
    DEFAULT_TABLE.exit_code(handle)
}

pub fn live_handles() -> usize {
    DEFAULT_TABLE.live_handles()
}
