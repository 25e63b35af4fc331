mod app_control;
mod archive;
mod data_files;
mod host;
mod process;
mod service;
mod uninstall;

pub use app_control::{
    classify_pkill_exit, classify_taskkill_exit, AppControl, KillResult, SystemAppControl,
    WindowHandle, TASKKILL_NO_CHILDREN,
};
pub use archive::{ArchiveDirectoryProvider, ArchiveProvider, BundledArchive, SevenZipArchive};
pub use data_files::{
    remove_factory_reset_data, remove_factory_reset_data_with_remover, remove_file_if_exists,
    AppDataLayout, RemovalReport,
};
pub use host::{default_archive_dir, default_settings_dir, system_collaborators, HostOptions};
pub use process::{
    secondary_process, LaunchError, ProcessHandle, ProcessId, ProcessRunner, ProcessWaitResult,
    SystemProcessRunner, ERROR_FILE_NOT_FOUND, INVALID_EXIT_CODE,
};
pub use service::{ServiceControl, ServiceError, ServiceState, SystemServiceControl};
pub use uninstall::{
    extract_single_entry, UninstallCollaborators, UninstallDescriptor, UninstallPrevious,
    UninstallState, BLOCK_NAME,
};
