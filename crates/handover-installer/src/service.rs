use thiserror::Error;

/// Failure reported by the service manager, with its numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code})")]
pub struct ServiceError {
    pub message: String,
    pub code: u32,
}

impl ServiceError {
    pub fn new(message: impl Into<String>, code: u32) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    StopPending,
    Running,
    Other(u32),
}

pub trait ServiceControl {
    /// Requests a stop. Every refusal, including a missing or already
    /// stopped service, is reported as a `ServiceError`.
    fn stop(&self, name: &str) -> Result<(), ServiceError>;

    fn query(&self, name: &str) -> Result<ServiceState, ServiceError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemServiceControl;

#[cfg(windows)]
mod scm {
    use windows::core::PCWSTR;
    use windows::Win32::System::Services::{
        CloseServiceHandle, ControlService, OpenSCManagerW, OpenServiceW, QueryServiceStatus,
        SC_HANDLE, SC_MANAGER_CONNECT, SERVICE_CONTROL_STOP, SERVICE_QUERY_STATUS,
        SERVICE_RUNNING, SERVICE_STATUS, SERVICE_STOP, SERVICE_STOPPED, SERVICE_STOP_PENDING,
    };

    use super::{ServiceError, ServiceState};

    struct ScHandle(SC_HANDLE);

    impl Drop for ScHandle {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseServiceHandle(self.0);
            }
        }
    }

    fn to_wide(value: &str) -> Vec<u16> {
        value.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn translate(context: &str, err: windows::core::Error) -> ServiceError {
        let code = (err.code().0 as u32) & 0xFFFF;
        ServiceError::new(format!("{context}: {}", err.message()), code)
    }

    fn open_service(name: &str, access: u32) -> Result<(ScHandle, ScHandle), ServiceError> {
        let manager = unsafe { OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_CONNECT) }
            .map_err(|err| translate("OpenSCManagerW failed", err))?;
        let manager = ScHandle(manager);
        let wide = to_wide(name);
        let service = unsafe { OpenServiceW(manager.0, PCWSTR(wide.as_ptr()), access) }
            .map_err(|err| translate("OpenServiceW failed", err))?;
        Ok((manager, ScHandle(service)))
    }

    pub(super) fn stop(name: &str) -> Result<(), ServiceError> {
        let (_manager, service) = open_service(name, SERVICE_STOP | SERVICE_QUERY_STATUS)?;
        let mut status = SERVICE_STATUS::default();
        unsafe { ControlService(service.0, SERVICE_CONTROL_STOP, &mut status) }
            .map_err(|err| translate("ControlService stop failed", err))
    }

    pub(super) fn query(name: &str) -> Result<ServiceState, ServiceError> {
        let (_manager, service) = open_service(name, SERVICE_QUERY_STATUS)?;
        let mut status = SERVICE_STATUS::default();
        unsafe { QueryServiceStatus(service.0, &mut status) }
            .map_err(|err| translate("QueryServiceStatus failed", err))?;
        Ok(match status.dwCurrentState {
            state if state == SERVICE_STOPPED => ServiceState::Stopped,
            state if state == SERVICE_STOP_PENDING => ServiceState::StopPending,
            state if state == SERVICE_RUNNING => ServiceState::Running,
            other => ServiceState::Other(other.0),
        })
    }
}

#[cfg(windows)]
impl ServiceControl for SystemServiceControl {
    fn stop(&self, name: &str) -> Result<(), ServiceError> {
        scm::stop(name)
    }

    fn query(&self, name: &str) -> Result<ServiceState, ServiceError> {
        scm::query(name)
    }
}

#[cfg(not(windows))]
impl ServiceControl for SystemServiceControl {
    fn stop(&self, name: &str) -> Result<(), ServiceError> {
        let output = std::process::Command::new("systemctl")
            .arg("stop")
            .arg(name)
            .output()
            .map_err(|err| {
                ServiceError::new(
                    format!("failed to start systemctl: {err}"),
                    err.raw_os_error().unwrap_or(0) as u32,
                )
            })?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ServiceError::new(
            format!("systemctl stop {name} failed: {}", stderr.trim()),
            output.status.code().unwrap_or(-1) as u32,
        ))
    }

    fn query(&self, name: &str) -> Result<ServiceState, ServiceError> {
        let output = std::process::Command::new("systemctl")
            .arg("is-active")
            .arg(name)
            .output()
            .map_err(|err| {
                ServiceError::new(
                    format!("failed to start systemctl: {err}"),
                    err.raw_os_error().unwrap_or(0) as u32,
                )
            })?;
        Ok(parse_systemctl_state(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[cfg(not(windows))]
pub(crate) fn parse_systemctl_state(raw: &str) -> ServiceState {
    match raw.trim() {
        "active" | "reloading" | "activating" => ServiceState::Running,
        "deactivating" => ServiceState::StopPending,
        "inactive" | "failed" => ServiceState::Stopped,
        _ => ServiceState::Other(0),
    }
}
