//! Native child-process layer.
//!
//! Spawns a child from an assembled command line, an optional raw
//! environment block and optional append-mode redirects, then exposes its
//! three standard streams as bounds-checked byte pipes together with an
//! interruptible wait.
//!
//! Two surfaces are provided:
//!
//! - [`ProcessRecord`] methods return `Result`s and are what Rust callers
//!   normally want.
//! - [`ProcessTable`] (and the free functions in [`api`]) speak integer
//!   handles, `-1` sentinels and per-handle last-error strings.

pub mod api;
pub mod check;
pub mod cmdline;
pub mod config;
pub mod environment;
pub mod launcher;
pub mod pipe_io;
pub mod record;
pub mod registry;
pub mod terminate;
pub mod wait;

pub use api::{default_table, ProcessTable};
pub use check::process_exists;
pub use cmdline::{quote_command_line, split_command_line};
pub use config::TableConfig;
pub use environment::{EnvEntry, EnvironmentBlock};
pub use launcher::{launch, LaunchRequest};
pub use pipe_io::checked_range;
pub use record::ProcessRecord;
pub use registry::ProcessRegistry;
pub use terminate::force_kill;
pub use wait::{exit_code_from_status, WaitOutcome};

pub use childpipe_common::{HandleId, PipeError, PipeResult, ProcessError, ProcessResult, StreamKind};
