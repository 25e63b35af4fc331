use anyhow::Result;
use handover_core::ProductConfig;

/// Opaque handle to the running application's main window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillResult {
    Killed,
    NoProcess,
    /// The kill tool ran but reported this exit status.
    Failed(u32),
}

impl KillResult {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Killed | Self::NoProcess)
    }
}

/// Window and process operations used to shut the running application down.
pub trait AppControl {
    fn find_main_window(&self) -> Option<WindowHandle>;
    fn broadcast_activate(&self, window: WindowHandle);
    fn post_close(&self, window: WindowHandle);
    /// An `Err` means the kill tool could not be started at all.
    fn force_kill(&self, exe_name: &str) -> Result<KillResult>;
}

#[derive(Debug, Clone)]
pub struct SystemAppControl {
    #[cfg(windows)]
    window_class: Option<String>,
    #[cfg(windows)]
    window_title: Option<String>,
    activate_message: String,
    exe_name: String,
}

impl SystemAppControl {
    pub fn from_config(config: &ProductConfig) -> Self {
        Self {
            #[cfg(windows)]
            window_class: config.window_class.clone(),
            #[cfg(windows)]
            window_title: config.window_title.clone(),
            activate_message: config.activate_message_name(),
            exe_name: config.exe_name.clone(),
        }
    }

    pub fn exe_name(&self) -> &str {
        &self.exe_name
    }
}

/// `taskkill` reports a missing target as ERROR_WAIT_NO_CHILDREN.
pub const TASKKILL_NO_CHILDREN: u32 = 128;

pub fn classify_taskkill_exit(code: u32) -> KillResult {
    match code {
        0 => KillResult::Killed,
        TASKKILL_NO_CHILDREN => KillResult::NoProcess,
        other => KillResult::Failed(other),
    }
}

/// `pkill` exits 1 when nothing matched.
pub fn classify_pkill_exit(code: u32) -> KillResult {
    match code {
        0 => KillResult::Killed,
        1 => KillResult::NoProcess,
        other => KillResult::Failed(other),
    }
}

#[cfg(windows)]
mod win {
    use std::ffi::c_void;
    use std::path::PathBuf;
    use std::process::Command;

    use anyhow::{Context, Result};
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        FindWindowW, PostMessageW, RegisterWindowMessageW, WM_CLOSE,
    };

    use super::{classify_taskkill_exit, KillResult, SystemAppControl, WindowHandle};
    use crate::process::{hide_console_window, INVALID_EXIT_CODE};

    fn to_wide(value: &str) -> Vec<u16> {
        value.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn hwnd(window: WindowHandle) -> HWND {
        HWND(window.0 as *mut c_void)
    }

    pub(super) fn find_main_window(control: &SystemAppControl) -> Option<WindowHandle> {
        let class = control.window_class.as_deref().map(to_wide);
        let title = control.window_title.as_deref().map(to_wide);
        let class_ptr = class
            .as_ref()
            .map_or(PCWSTR::null(), |wide| PCWSTR(wide.as_ptr()));
        let title_ptr = title
            .as_ref()
            .map_or(PCWSTR::null(), |wide| PCWSTR(wide.as_ptr()));
        let found = unsafe { FindWindowW(class_ptr, title_ptr) }.ok()?;
        (!found.is_invalid()).then_some(WindowHandle(found.0 as isize))
    }

    pub(super) fn broadcast_activate(control: &SystemAppControl, window: WindowHandle) {
        let name = to_wide(&control.activate_message);
        let message = unsafe { RegisterWindowMessageW(PCWSTR(name.as_ptr())) };
        if message == 0 {
            log::warn!("failed to register window message {}", control.activate_message);
            return;
        }
        if let Err(err) = unsafe { PostMessageW(hwnd(window), message, WPARAM(0), LPARAM(0)) } {
            log::debug!("activate message was not posted: {}", err.message());
        }
    }

    pub(super) fn post_close(window: WindowHandle) {
        if let Err(err) = unsafe { PostMessageW(hwnd(window), WM_CLOSE, WPARAM(0), LPARAM(0)) } {
            log::debug!("close request was not posted: {}", err.message());
        }
    }

    fn taskkill_path() -> PathBuf {
        let root = std::env::var_os("SystemRoot").unwrap_or_else(|| "C:\\Windows".into());
        PathBuf::from(root).join("System32").join("taskkill.exe")
    }

    pub(super) fn force_kill(exe_name: &str) -> Result<KillResult> {
        let program = taskkill_path();
        let mut command = Command::new(&program);
        command.arg("/f").arg("/im").arg(exe_name);
        hide_console_window(&mut command);
        let status = command
            .status()
            .with_context(|| format!("failed to start {}", program.display()))?;
        let code = status.code().map_or(INVALID_EXIT_CODE, |code| code as u32);
        Ok(classify_taskkill_exit(code))
    }
}

#[cfg(windows)]
impl AppControl for SystemAppControl {
    fn find_main_window(&self) -> Option<WindowHandle> {
        win::find_main_window(self)
    }

    fn broadcast_activate(&self, window: WindowHandle) {
        win::broadcast_activate(self, window);
    }

    fn post_close(&self, window: WindowHandle) {
        win::post_close(window);
    }

    fn force_kill(&self, exe_name: &str) -> Result<KillResult> {
        win::force_kill(exe_name)
    }
}

// Without a window system to query, the application's process stands in for
// its main window and a close request becomes SIGTERM.
#[cfg(unix)]
mod posix {
    use std::process::Command;

    use anyhow::{Context, Result};

    use super::{classify_pkill_exit, KillResult, WindowHandle};
    use crate::process::INVALID_EXIT_CODE;

    fn process_name(exe_name: &str) -> &str {
        exe_name.strip_suffix(".exe").unwrap_or(exe_name)
    }

    pub(super) fn find_main_window(exe_name: &str) -> Option<WindowHandle> {
        let output = Command::new("pgrep")
            .arg("-x")
            .arg(process_name(exe_name))
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .find_map(|line| line.trim().parse::<isize>().ok())
            .map(WindowHandle)
    }

    pub(super) fn post_close(window: WindowHandle) {
        let Ok(pid) = libc::pid_t::try_from(window.0) else {
            return;
        };
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc != 0 {
            log::debug!(
                "SIGTERM to {pid} failed: {}",
                std::io::Error::last_os_error()
            );
        }
    }

    pub(super) fn force_kill(exe_name: &str) -> Result<KillResult> {
        let status = Command::new("pkill")
            .arg("-KILL")
            .arg("-x")
            .arg(process_name(exe_name))
            .status()
            .context("failed to start pkill")?;
        let code = status.code().map_or(INVALID_EXIT_CODE, |code| code as u32);
        Ok(classify_pkill_exit(code))
    }
}

#[cfg(unix)]
impl AppControl for SystemAppControl {
    fn find_main_window(&self) -> Option<WindowHandle> {
        posix::find_main_window(&self.exe_name)
    }

    fn broadcast_activate(&self, window: WindowHandle) {
        log::debug!("{} has no activation channel for {:?}", self.activate_message, window);
    }

    fn post_close(&self, window: WindowHandle) {
        posix::post_close(window);
    }

    fn force_kill(&self, exe_name: &str) -> Result<KillResult> {
        posix::force_kill(exe_name)
    }
}
