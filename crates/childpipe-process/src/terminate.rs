//! Forced process termination.
//!
//! SIGKILL on Unix, `TerminateProcess` on Windows. Callers must guarantee
//! the pid still belongs to their child (i.e. it has not been reaped yet).

use childpipe_common::{ProcessError, ProcessResult};

/// Force kill a process (SIGKILL on Unix, TerminateProcess on Windows).
pub fn force_kill(pid: u32) -> ProcessResult<()> {
    #[cfg(unix)]
    {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let nix_pid = Pid::from_raw(pid as i32);
        match kill(nix_pid, Signal::SIGKILL) {
            Ok(()) => Ok(()),
            // Already gone between the exit check and the signal.
            Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(ProcessError::terminate_failed(pid, e.to_string())),
        }
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        unsafe {
            let handle = match OpenProcess(PROCESS_TERMINATE, false, pid) {
                Ok(h) if !h.is_invalid() => h,
                Ok(_) => {
                    return Err(ProcessError::terminate_failed(
                        pid,
                        "OpenProcess returned an invalid handle",
                    ));
                }
                Err(e) => {
                    return Err(ProcessError::terminate_failed(
                        pid,
                        format!("OpenProcess failed: {}", e),
                    ));
                }
            };

            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);

            result.map_err(|e| {
                ProcessError::terminate_failed(pid, format!("TerminateProcess failed: {}", e))
            })
        }
    }
}
