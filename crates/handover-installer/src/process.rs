use std::io;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use thiserror::Error;

/// OS error reported when the program to launch does not exist.
pub const ERROR_FILE_NOT_FOUND: i32 = 2;
/// Exit code the launcher reports when the child's status could not be read.
pub const INVALID_EXIT_CODE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessWaitResult {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to launch {program}: {message}")]
pub struct LaunchError {
    pub program: String,
    pub code: Option<i32>,
    pub message: String,
}

impl LaunchError {
    pub fn from_io(program: &Path, err: &io::Error) -> Self {
        Self {
            program: program.display().to_string(),
            code: err.raw_os_error(),
            message: err.to_string(),
        }
    }

    pub fn invalid_exit_code(program: &Path) -> Self {
        Self {
            program: program.display().to_string(),
            code: None,
            message: "process reported an invalid exit code".to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code == Some(ERROR_FILE_NOT_FOUND)
    }

    pub fn os_code(&self) -> i32 {
        self.code.unwrap_or(0)
    }
}

/// Windows two-phase uninstallers report the id of their second phase as the
/// exit code.
pub fn secondary_process(exit_code: u32) -> Option<ProcessId> {
    (exit_code != 0 && exit_code != INVALID_EXIT_CODE).then_some(ProcessId(exit_code))
}

pub trait ProcessRunner {
    /// Runs `program` to completion and returns its exit code.
    fn run(&self, program: &Path, args: &[&str]) -> Result<u32, LaunchError>;

    /// The second uninstall phase announced by `exit_code`, if this host
    /// passes one through exit codes.
    fn secondary_process(&self, exit_code: u32) -> Option<ProcessId>;

    /// Blocks until `pid` exits. Returns `false` when the process could not
    /// be opened, which includes the process having exited already.
    fn wait_for_secondary(&self, pid: ProcessId) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, program: &Path, args: &[&str]) -> Result<u32, LaunchError> {
        let mut command = Command::new(program);
        command.args(args);
        hide_console_window(&mut command);
        let status = command
            .status()
            .map_err(|err| LaunchError::from_io(program, &err))?;
        Ok(status
            .code()
            .map(|code| code as u32)
            .unwrap_or(INVALID_EXIT_CODE))
    }

    #[cfg(windows)]
    fn secondary_process(&self, exit_code: u32) -> Option<ProcessId> {
        secondary_process(exit_code)
    }

    // POSIX exit statuses are 8 bits wide and never carry a pid.
    #[cfg(not(windows))]
    fn secondary_process(&self, _exit_code: u32) -> Option<ProcessId> {
        None
    }

    fn wait_for_secondary(&self, pid: ProcessId) -> bool {
        let handle = ProcessHandle::open(pid);
        if !handle.is_valid() {
            return false;
        }
        handle.wait(None);
        true
    }
}

#[cfg(windows)]
pub(crate) fn hide_console_window(command: &mut Command) {
    use std::os::windows::process::CommandExt;

    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
pub(crate) fn hide_console_window(_command: &mut Command) {}

/// Owned handle to a process this installer did not spawn. The handle is
/// released when dropped.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: ProcessId,
    #[cfg(windows)]
    raw: Option<windows::Win32::Foundation::HANDLE>,
    #[cfg(not(windows))]
    opened: bool,
}

#[cfg(windows)]
impl ProcessHandle {
    pub fn open(pid: ProcessId) -> Self {
        use windows::Win32::System::Threading::{OpenProcess, PROCESS_SYNCHRONIZE};

        let raw = unsafe { OpenProcess(PROCESS_SYNCHRONIZE, false, pid.0) }.ok();
        Self { pid, raw }
    }

    pub fn is_valid(&self) -> bool {
        self.raw.is_some_and(|handle| !handle.is_invalid())
    }

    pub fn wait(&self, timeout: Option<Duration>) -> ProcessWaitResult {
        use windows::Win32::Foundation::{WAIT_OBJECT_0, WAIT_TIMEOUT};
        use windows::Win32::System::Threading::{WaitForSingleObject, INFINITE};

        let Some(handle) = self.raw else {
            return ProcessWaitResult {
                exit_code: None,
                timed_out: false,
            };
        };
        let millis = timeout
            .map(|value| u32::try_from(value.as_millis()).unwrap_or(INFINITE - 1))
            .unwrap_or(INFINITE);
        let event = unsafe { WaitForSingleObject(handle, millis) };
        if event == WAIT_OBJECT_0 {
            log::debug!("process {} exited", self.pid);
        }
        ProcessWaitResult {
            exit_code: None,
            timed_out: event == WAIT_TIMEOUT,
        }
    }
}

#[cfg(windows)]
impl Drop for ProcessHandle {
    fn drop(&mut self) {
        use windows::Win32::Foundation::CloseHandle;

        if let Some(handle) = self.raw.take() {
            unsafe {
                let _ = CloseHandle(handle);
            }
        }
    }
}

#[cfg(not(windows))]
impl ProcessHandle {
    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    pub fn open(pid: ProcessId) -> Self {
        Self {
            pid,
            opened: pid.0 != 0 && process_alive(pid),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.opened
    }

    pub fn wait(&self, timeout: Option<Duration>) -> ProcessWaitResult {
        if !self.opened {
            return ProcessWaitResult {
                exit_code: None,
                timed_out: false,
            };
        }
        let start = std::time::Instant::now();
        while process_alive(self.pid) {
            if timeout.is_some_and(|limit| start.elapsed() >= limit) {
                return ProcessWaitResult {
                    exit_code: None,
                    timed_out: true,
                };
            }
            std::thread::sleep(Self::POLL_INTERVAL);
        }
        log::debug!("process {} exited", self.pid);
        ProcessWaitResult {
            exit_code: None,
            timed_out: false,
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }
}

#[cfg(windows)]
impl ProcessHandle {
    pub fn pid(&self) -> ProcessId {
        self.pid
    }
}

#[cfg(unix)]
fn process_alive(pid: ProcessId) -> bool {
    let Ok(raw) = libc::pid_t::try_from(pid.0) else {
        return false;
    };
    let rc = unsafe { libc::kill(raw, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(any(unix, windows)))]
fn process_alive(_pid: ProcessId) -> bool {
    false
}
