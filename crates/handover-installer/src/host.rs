use std::path::PathBuf;

use anyhow::Result;
use handover_core::ProductConfig;
use handover_settings::{FileSettingsStore, SettingsStore};

use crate::app_control::SystemAppControl;
use crate::archive::ArchiveDirectoryProvider;
use crate::data_files::{remove_file_if_exists, AppDataLayout};
use crate::process::SystemProcessRunner;
use crate::service::SystemServiceControl;
use crate::uninstall::UninstallCollaborators;

/// Where the host collaborators find their inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostOptions {
    pub archive_dir: Option<PathBuf>,
    /// Use TOML settings files under this directory instead of the registry.
    pub settings_dir: Option<PathBuf>,
    pub data_root: Option<PathBuf>,
}

pub fn default_settings_dir() -> Result<PathBuf> {
    Ok(AppDataLayout::default_root()?.join("handover").join("settings"))
}

/// Installer binaries ship their archives next to the executable.
pub fn default_archive_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    Ok(exe
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".")))
}

pub fn system_collaborators(
    config: &ProductConfig,
    options: &HostOptions,
) -> Result<UninstallCollaborators> {
    let archive_dir = match &options.archive_dir {
        Some(dir) => dir.clone(),
        None => default_archive_dir()?,
    };
    let data_root = match &options.data_root {
        Some(root) => root.clone(),
        None => AppDataLayout::default_root()?,
    };
    log::debug!(
        "host: archives in {}, data root {}",
        archive_dir.display(),
        data_root.display()
    );

    Ok(UninstallCollaborators {
        app: Box::new(SystemAppControl::from_config(config)),
        services: Box::new(SystemServiceControl),
        settings: settings_store(options)?,
        runner: Box::new(SystemProcessRunner),
        archives: Box::new(ArchiveDirectoryProvider::new(archive_dir)),
        data_layout: AppDataLayout::from_config(data_root, config),
        remove_file: Box::new(remove_file_if_exists),
    })
}

#[cfg(windows)]
fn settings_store(options: &HostOptions) -> Result<Box<dyn SettingsStore>> {
    Ok(match &options.settings_dir {
        Some(dir) => Box::new(FileSettingsStore::new(dir)),
        None => Box::new(handover_settings::WindowsRegistryStore::new()),
    })
}

#[cfg(not(windows))]
fn settings_store(options: &HostOptions) -> Result<Box<dyn SettingsStore>> {
    let dir = match &options.settings_dir {
        Some(dir) => dir.clone(),
        None => default_settings_dir()?,
    };
    Ok(Box::new(FileSettingsStore::new(dir)))
}
