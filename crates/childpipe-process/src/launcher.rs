//! Process launcher.
//!
//! Turns a [`LaunchRequest`] into a [`ProcessRecord`]. Launching never
//! fails from the caller's point of view: a request that cannot be spawned
//! still produces a record, one whose last error explains why and whose
//! streams are all unconnected.

use crate::cmdline::split_command_line;
use crate::environment::EnvironmentBlock;
use crate::record::ProcessRecord;
use childpipe_common::{HandleId, ProcessError, ProcessResult};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

/// Everything needed to start one process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchRequest<'a> {
    /// Fully assembled command line; see [`crate::quote_command_line`].
    pub command_line: &'a str,
    /// Raw environment block. `None` inherits the parent's environment.
    pub environment: Option<&'a [u8]>,
    /// Append stdout to this file instead of a pipe.
    pub stdout_redirect: Option<&'a Path>,
    /// Append stderr to this file instead of a pipe.
    pub stderr_redirect: Option<&'a Path>,
}

impl<'a> LaunchRequest<'a> {
    pub fn new(command_line: &'a str) -> Self {
        Self {
            command_line,
            ..Self::default()
        }
    }

    pub fn environment(mut self, block: &'a [u8]) -> Self {
        self.environment = Some(block);
        self
    }

    pub fn stdout_to(mut self, path: &'a Path) -> Self {
        self.stdout_redirect = Some(path);
        self
    }

    pub fn stderr_to(mut self, path: &'a Path) -> Self {
        self.stderr_redirect = Some(path);
        self
    }
}

/// Start the process described by `request` and wrap it in a record.
pub fn launch(id: HandleId, request: &LaunchRequest<'_>) -> ProcessRecord {
    let argv = split_command_line(request.command_line);
    let program = argv
        .first()
        .cloned()
        .unwrap_or_else(|| request.command_line.to_string());

    match spawn(&argv, request) {
        Ok(child) => {
            info!(
                "Process spawned successfully: {} (handle {}, PID: {})",
                program,
                id,
                child.id()
            );
            ProcessRecord::spawned(
                id,
                program,
                child,
                request.stdout_redirect.is_some(),
                request.stderr_redirect.is_some(),
            )
        }
        Err(e) => {
            warn!("Failed to launch handle {}: {}", id, e);
            ProcessRecord::inert(id, program, &e)
        }
    }
}

fn spawn(argv: &[String], request: &LaunchRequest<'_>) -> ProcessResult<Child> {
    let environment = request
        .environment
        .map(EnvironmentBlock::decode)
        .transpose()?;
    let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommandLine)?;

    let mut cmd = Command::new(program);
    cmd.args(args);

    if let Some(environment) = &environment {
        debug!("Using explicit environment with {} entries", environment.entries().len());
        cmd.env_clear();
        cmd.envs(environment.pairs());
    }

    let stdout_file = request.stdout_redirect.map(open_append).transpose()?;
    let stderr_file = match (request.stderr_redirect, request.stdout_redirect, &stdout_file) {
        (Some(err_path), Some(out_path), Some(out_file)) if same_target(err_path, out_path) => {
            // One open file description, so both streams append in program order.
            let shared = out_file
                .try_clone()
                .map_err(|e| ProcessError::redirect(err_path.display().to_string(), e.to_string()))?;
            Some(shared)
        }
        (Some(err_path), _, _) => Some(open_append(err_path)?),
        (None, _, _) => None,
    };

    cmd.stdin(Stdio::piped());
    cmd.stdout(stdout_file.map(Stdio::from).unwrap_or_else(Stdio::piped));
    cmd.stderr(stderr_file.map(Stdio::from).unwrap_or_else(Stdio::piped));

    cmd.spawn()
        .map_err(|e| ProcessError::spawn_failed(program.as_str(), e.to_string()))
}

fn open_append(path: &Path) -> ProcessResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ProcessError::redirect(path.display().to_string(), e.to_string()))
}

fn same_target(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
