//! Core domain types used throughout childpipe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exit code reported by a wait that was interrupted before the child exited.
pub const INTERRUPTED_EXIT_CODE: i32 = -1;

/// Opaque identifier of a spawned (or failed-to-spawn) process.
///
/// Identifiers are allocated by the registry, start at 1 and are never
/// reused within a registry, so a stale identifier can only ever resolve
/// to "unknown handle".
///
/// # Example
/// ```
/// use childpipe_common::HandleId;
///
/// let id = HandleId::from_raw(7);
/// assert_eq!(id.as_raw(), 7);
/// assert_eq!(id.to_string(), "#7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HandleId(u64);

impl HandleId {
    /// Wraps a raw identifier, e.g. one that crossed an FFI boundary.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One of the three standard streams of a child process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdin => write!(f, "stdin"),
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}
