//! # childpipe common
//!
//! Error types and small domain types shared by the childpipe crates.
//!
//! Everything that crosses a crate boundary lives here: the handle
//! identifier, the stream names, and the two error enums used by the
//! launcher and the pipe engine.

pub mod errors;
pub mod types;

// Re-export commonly used items
pub use errors::{PipeError, PipeResult, ProcessError, ProcessResult};
pub use types::{HandleId, StreamKind, INTERRUPTED_EXIT_CODE};
