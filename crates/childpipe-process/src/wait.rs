//! Wait/interrupt controller.
//!
//! `wait` blocks on the record's condvar and re-checks the child with
//! `try_wait` every poll interval. `interrupt` raises a sticky flag and
//! wakes the condvar, so a blocked wait returns
//! [`WaitOutcome::Interrupted`] without touching the child. Only
//! `terminate` ends the process.
//!
//! Interruption is cooperative: it cannot cut short a native call that is
//! already in progress, it only takes effect at the next condvar wake-up.

use crate::record::{lock, Lifecycle, ProcessRecord};
use chrono::Utc;
use childpipe_common::{ProcessError, ProcessResult, INTERRUPTED_EXIT_CODE};
use std::process::ExitStatus;
use std::sync::atomic::Ordering;
use std::sync::PoisonError;
use std::time::Duration;
use tracing::{debug, info};

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The process exited with this code.
    Exited(i32),
    /// An interrupt was requested before the process exited.
    Interrupted,
}

impl WaitOutcome {
    /// Exit code, or [`INTERRUPTED_EXIT_CODE`] for an interrupted wait.
    pub fn code(&self) -> i32 {
        match self {
            WaitOutcome::Exited(code) => *code,
            WaitOutcome::Interrupted => INTERRUPTED_EXIT_CODE,
        }
    }
}

impl ProcessRecord {
    /// Block until the process exits or an interrupt is requested.
    ///
    /// An exit that has already happened wins over a pending interrupt.
    pub fn wait(&self, poll_interval: Duration) -> ProcessResult<WaitOutcome> {
        let mut state = lock(&self.lifecycle);
        loop {
            if let Some(code) = self.observe_exit(&mut state)? {
                return Ok(WaitOutcome::Exited(code));
            }
            if state.child.is_none() {
                return Err(if self.is_started() {
                    ProcessError::wait_failed(self.id(), "handle was disposed")
                } else {
                    ProcessError::not_started(self.id())
                });
            }
            if self.is_interrupted() {
                info!("Handle {}: wait interrupted", self.id());
                return Ok(WaitOutcome::Interrupted);
            }

            state = self
                .exit_changed
                .wait_timeout(state, poll_interval)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Request that a blocked or future wait return early.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        // Taken so the notification cannot slip between a waiter's flag check
        // and its condvar wait.
        let _state = lock(&self.lifecycle);
        self.exit_changed.notify_all();
        debug!("Handle {}: interrupt requested", self.id());
    }

    /// Forcibly end the process. Succeeds without effect if it already exited.
    ///
    /// Killing the child closes its pipe ends, so readers blocked on stdout
    /// or stderr observe EOF.
    pub fn terminate(&self) -> ProcessResult<()> {
        let mut state = lock(&self.lifecycle);
        if self.observe_exit(&mut state)?.is_some() {
            debug!("Handle {}: terminate after exit is a no-op", self.id());
            return Ok(());
        }

        let pid = match (state.child.as_ref(), self.pid()) {
            (Some(_), Some(pid)) => pid,
            _ => return Err(ProcessError::not_started(self.id())),
        };

        // The child has not been reaped, so the pid still names it.
        crate::terminate::force_kill(pid)?;
        info!("Handle {}: terminated process (PID: {})", self.id(), pid);
        Ok(())
    }

    /// Record the exit if the child has finished. Must be called with the
    /// lifecycle lock held.
    fn observe_exit(&self, state: &mut Lifecycle) -> ProcessResult<Option<i32>> {
        if let Some(code) = state.exit_code {
            return Ok(Some(code));
        }
        let child = match state.child.as_mut() {
            Some(child) => child,
            None => return Ok(None),
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                let code = exit_code_from_status(status);
                state.exit_code = Some(code);
                state.exited_at = Some(Utc::now());
                self.exit_changed.notify_all();
                info!("Handle {}: process exited with code {}", self.id(), code);
                Ok(Some(code))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(ProcessError::wait_failed(self.id(), e.to_string())),
        }
    }
}

/// Map an exit status to a non-negative code; signal deaths become `128 + signal`.
pub fn exit_code_from_status(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    255
}
