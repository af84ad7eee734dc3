//! Pid liveness probe.
//!
//! "Exists" means the pid still names a process table entry: a child that
//! exited but was not reaped yet still exists, a reaped one does not.

use childpipe_common::{ProcessError, ProcessResult};

/// Check if a process with the given PID exists.
///
/// ```rust,no_run
/// use childpipe_process::process_exists;
///
/// assert!(process_exists(std::process::id()).unwrap());
/// ```
pub fn process_exists(pid: u32) -> ProcessResult<bool> {
    sys::probe(pid).map_err(|reason| ProcessError::check_failed(pid, reason))
}

#[cfg(unix)]
mod sys {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    /// Signal 0: permission and existence checks only, nothing is delivered.
    pub(super) fn probe(pid: u32) -> Result<bool, String> {
        match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) | Err(Errno::EPERM) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(e) => Err(e.to_string()),
        }
    }
}

#[cfg(windows)]
mod sys {
    use windows::Win32::Foundation::{CloseHandle, E_ACCESSDENIED, E_INVALIDARG};
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    pub(super) fn probe(pid: u32) -> Result<bool, String> {
        // SAFETY: the handle is closed before returning and never escapes.
        match unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) } {
            Ok(handle) => {
                let _ = unsafe { CloseHandle(handle) };
                Ok(true)
            }
            // Unknown pids are rejected as an invalid parameter.
            Err(e) if e.code() == E_INVALIDARG => Ok(false),
            Err(e) if e.code() == E_ACCESSDENIED => Ok(true),
            Err(e) => Err(e.to_string()),
        }
    }
}
