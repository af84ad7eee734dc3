//! Error types for childpipe.
//!
//! # Rust Learning Note
//!
//! Nothing in the handle API throws. Internally every fallible step returns
//! `Result<T, E>` and the flat API folds the error into a `-1` sentinel plus
//! the handle's last-error string. Two error families exist because the two
//! halves fail differently:
//!
//! - [`ProcessError`] covers spawning, handle lookup, waiting and termination.
//! - [`PipeError`] covers one read or write against one stream endpoint.
//!
//! ```rust
//! use childpipe_common::{PipeError, StreamKind};
//!
//! let err = PipeError::Redirected { stream: StreamKind::Stdout };
//! assert!(!err.records_last_error());
//! ```

use crate::types::{HandleId, StreamKind};
use thiserror::Error;

/// Process-level error types.
#[derive(Error, Debug, Clone)]
pub enum ProcessError {
    #[error("Process spawn failed: {command} - {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("Empty command line")]
    EmptyCommandLine,

    #[error("Invalid environment block: {reason}")]
    InvalidEnvironment { reason: String },

    #[error("Cannot open redirect target {path}: {reason}")]
    Redirect { path: String, reason: String },

    #[error("Unknown process handle {handle} (never created or already disposed)")]
    UnknownHandle { handle: HandleId },

    #[error("Process {handle} was never started")]
    NotStarted { handle: HandleId },

    #[error("Process wait failed: {handle} - {reason}")]
    WaitFailed { handle: HandleId, reason: String },

    #[error("Process terminate failed: pid {pid} - {reason}")]
    TerminateFailed { pid: u32, reason: String },

    #[error("Process check failed: pid {pid} - {reason}")]
    CheckFailed { pid: u32, reason: String },
}

impl ProcessError {
    pub fn spawn_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_environment(reason: impl Into<String>) -> Self {
        Self::InvalidEnvironment {
            reason: reason.into(),
        }
    }

    pub fn redirect(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Redirect {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_handle(handle: HandleId) -> Self {
        Self::UnknownHandle { handle }
    }

    pub fn not_started(handle: HandleId) -> Self {
        Self::NotStarted { handle }
    }

    pub fn wait_failed(handle: HandleId, reason: impl Into<String>) -> Self {
        Self::WaitFailed {
            handle,
            reason: reason.into(),
        }
    }

    pub fn terminate_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::TerminateFailed {
            pid,
            reason: reason.into(),
        }
    }

    pub fn check_failed(pid: u32, reason: impl Into<String>) -> Self {
        Self::CheckFailed {
            pid,
            reason: reason.into(),
        }
    }
}

/// Result type for process operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

/// Errors from a single read or write against a stream endpoint.
#[derive(Error, Debug)]
pub enum PipeError {
    /// Offset/length do not describe a slice of the caller's buffer.
    #[error("Range out of bounds: offset {offset}, length {length}, buffer size {capacity}")]
    OutOfBounds {
        offset: i64,
        length: i64,
        capacity: usize,
    },

    /// The stream is connected to a file, not a pipe.
    #[error("{stream} is redirected to a file and cannot be used as a pipe")]
    Redirected { stream: StreamKind },

    /// The peer closed the stream and all data has been consumed.
    #[error("{stream} is closed")]
    Closed { stream: StreamKind },

    /// The stream was never connected (the process failed to start).
    #[error("{stream} is not connected")]
    NotAvailable { stream: StreamKind },

    /// The owning handle was disposed.
    #[error("Process handle was disposed")]
    Disposed,

    /// Genuine OS-level failure on an otherwise valid operation.
    #[error("I/O error on {stream}: {source}")]
    Io {
        stream: StreamKind,
        #[source]
        source: std::io::Error,
    },
}

impl PipeError {
    pub fn out_of_bounds(offset: i64, length: i64, capacity: usize) -> Self {
        Self::OutOfBounds {
            offset,
            length,
            capacity,
        }
    }

    pub fn io(stream: StreamKind, source: std::io::Error) -> Self {
        Self::Io { stream, source }
    }

    /// Whether this failure is a fault that belongs in the handle's last error.
    ///
    /// Contract violations and unavailable streams are expected shapes, only
    /// OS failures are recorded.
    pub fn records_last_error(&self) -> bool {
        matches!(self, PipeError::Io { .. })
    }
}

/// Result type for pipe operations.
pub type PipeResult<T> = std::result::Result<T, PipeError>;
