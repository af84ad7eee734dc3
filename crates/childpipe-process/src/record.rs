//! Per-handle native record.
//!
//! A [`ProcessRecord`] owns everything one launch produced: the child, its
//! three stream endpoints, the last-error slot and the interrupt flag. The
//! registry hands out `Arc<ProcessRecord>` so a thread blocked in a read
//! keeps the record alive even if another thread disposes the handle.
//!
//! Locking: each stream endpoint has its own mutex so stdin, stdout and
//! stderr can be driven from different threads. The child and its exit code
//! share one mutex, paired with the `exit_changed` condvar used by waits.

use chrono::{DateTime, Utc};
use childpipe_common::{HandleId, PipeError, PipeResult, ProcessError, StreamKind};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::{debug, warn};

/// One stream endpoint as seen from the parent.
#[derive(Debug)]
pub(crate) enum Endpoint<T> {
    /// Live pipe end.
    Pipe(T),
    /// The child side is a file; there is nothing to read here.
    Redirected,
    /// Peer closed (EOF / broken pipe) or released by dispose.
    Closed,
    /// Never connected because the process did not start.
    Unconnected,
}

impl<T> Endpoint<T> {
    pub(crate) fn from_pipe(pipe: Option<T>) -> Self {
        match pipe {
            Some(pipe) => Endpoint::Pipe(pipe),
            None => Endpoint::Unconnected,
        }
    }

    pub(crate) fn pipe_mut(&mut self, stream: StreamKind) -> PipeResult<&mut T> {
        match self {
            Endpoint::Pipe(pipe) => Ok(pipe),
            Endpoint::Redirected => Err(PipeError::Redirected { stream }),
            Endpoint::Closed => Err(PipeError::Closed { stream }),
            Endpoint::Unconnected => Err(PipeError::NotAvailable { stream }),
        }
    }
}

/// Child process and its observed exit, guarded together.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    pub(crate) child: Option<Child>,
    pub(crate) exit_code: Option<i32>,
    pub(crate) exited_at: Option<DateTime<Utc>>,
}

/// Native state behind one [`HandleId`].
#[derive(Debug)]
pub struct ProcessRecord {
    id: HandleId,
    program: String,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    pub(crate) lifecycle: Mutex<Lifecycle>,
    pub(crate) exit_changed: Condvar,
    pub(crate) stdin: Mutex<Endpoint<ChildStdin>>,
    pub(crate) stdout: Mutex<Endpoint<ChildStdout>>,
    pub(crate) stderr: Mutex<Endpoint<ChildStderr>>,
    last_error: Mutex<String>,
    pub(crate) interrupted: AtomicBool,
    disposed: AtomicBool,
}

impl ProcessRecord {
    /// Wrap a freshly spawned child. Pipes are taken out of `child`;
    /// redirected streams become [`Endpoint::Redirected`].
    pub(crate) fn spawned(
        id: HandleId,
        program: impl Into<String>,
        mut child: Child,
        stdout_redirected: bool,
        stderr_redirected: bool,
    ) -> Self {
        let pid = child.id();
        let stdin = Endpoint::from_pipe(child.stdin.take());
        let stdout = if stdout_redirected {
            Endpoint::Redirected
        } else {
            Endpoint::from_pipe(child.stdout.take())
        };
        let stderr = if stderr_redirected {
            Endpoint::Redirected
        } else {
            Endpoint::from_pipe(child.stderr.take())
        };

        Self {
            id,
            program: program.into(),
            pid: Some(pid),
            started_at: Utc::now(),
            lifecycle: Mutex::new(Lifecycle {
                child: Some(child),
                ..Lifecycle::default()
            }),
            exit_changed: Condvar::new(),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(stdout),
            stderr: Mutex::new(stderr),
            last_error: Mutex::new(String::new()),
            interrupted: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// A record for a launch that failed. Every stream is unconnected and
    /// the last error carries the spawn failure.
    pub(crate) fn inert(id: HandleId, program: impl Into<String>, error: &ProcessError) -> Self {
        Self {
            id,
            program: program.into(),
            pid: None,
            started_at: Utc::now(),
            lifecycle: Mutex::new(Lifecycle::default()),
            exit_changed: Condvar::new(),
            stdin: Mutex::new(Endpoint::Unconnected),
            stdout: Mutex::new(Endpoint::Unconnected),
            stderr: Mutex::new(Endpoint::Unconnected),
            last_error: Mutex::new(error.to_string()),
            interrupted: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Program name the record was launched with (first command line token).
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Native process id; `None` when the process never started.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether a native process was actually created.
    pub fn is_started(&self) -> bool {
        self.pid.is_some()
    }

    /// Exit code, if a wait or terminate has already observed the exit.
    pub fn exit_code(&self) -> Option<i32> {
        lock(&self.lifecycle).exit_code
    }

    pub fn exited_at(&self) -> Option<DateTime<Utc>> {
        lock(&self.lifecycle).exited_at
    }

    /// Message of the most recent failed operation; empty after a success.
    pub fn last_error(&self) -> String {
        lock(&self.last_error).clone()
    }

    pub(crate) fn set_last_error(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("Handle {} last error: {}", self.id, message);
        *lock(&self.last_error) = message;
    }

    pub(crate) fn clear_last_error(&self) {
        lock(&self.last_error).clear();
    }

    /// Whether [`ProcessRecord::interrupt`] was ever called.
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Mark disposed, end the process and drop whatever pipes are not in use.
    ///
    /// Pipes currently held by a blocked reader or writer are released when
    /// the last `Arc` to the record goes away.
    pub(crate) fn release(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Err(e) = self.terminate() {
            if !matches!(e, ProcessError::NotStarted { .. }) {
                warn!("Handle {}: terminate during dispose failed: {}", self.id, e);
            }
        }

        let child = {
            let mut state = lock(&self.lifecycle);
            let child = state.child.take();
            self.exit_changed.notify_all();
            if state.exit_code.is_some() {
                // try_wait already reaped it.
                None
            } else {
                child
            }
        };
        if let Some(child) = child {
            spawn_reaper(self.id, child);
        }

        release_endpoint(&self.stdin);
        release_endpoint(&self.stdout);
        release_endpoint(&self.stderr);
    }
}

/// Collect the exit status of a killed child so it does not linger as a zombie.
fn spawn_reaper(id: HandleId, mut child: Child) {
    let spawned = std::thread::Builder::new()
        .name(format!("childpipe-reaper-{}", id.as_raw()))
        .spawn(move || {
            if let Err(e) = child.wait() {
                warn!("Handle {}: reaping disposed child failed: {}", id, e);
            }
        });
    if let Err(e) = spawned {
        warn!("Handle {}: could not start reaper thread: {}", id, e);
    }
}

fn release_endpoint<T>(slot: &Mutex<Endpoint<T>>) {
    let mut endpoint = match slot.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => return,
    };
    if matches!(*endpoint, Endpoint::Pipe(_)) {
        *endpoint = Endpoint::Closed;
    }
}

/// Lock a mutex, recovering the data if another thread panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
