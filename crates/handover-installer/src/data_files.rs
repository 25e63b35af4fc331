use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use handover_core::ProductConfig;

/// Per-user files a factory reset removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDataLayout {
    root: PathBuf,
    extra_config_file: String,
    data_dir: String,
}

impl AppDataLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        extra_config_file: impl Into<String>,
        data_dir: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            extra_config_file: extra_config_file.into(),
            data_dir: data_dir.into(),
        }
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &ProductConfig) -> Self {
        Self::new(root, &config.extra_config_file, &config.data_dir)
    }

    /// `%LOCALAPPDATA%` on Windows, the XDG data home elsewhere.
    pub fn default_root() -> Result<PathBuf> {
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            return Ok(PathBuf::from(local));
        }
        if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
            return Ok(PathBuf::from(xdg));
        }
        let home = std::env::var_os("HOME")
            .ok_or_else(|| anyhow!("neither LOCALAPPDATA nor HOME is set"))?;
        Ok(PathBuf::from(home).join(".local").join("share"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extra_config_path(&self) -> PathBuf {
        self.root.join(&self.extra_config_file)
    }

    pub fn data_dir_path(&self) -> PathBuf {
        self.data_dir
            .split(['/', '\\'])
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub removed: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

pub fn remove_factory_reset_data(layout: &AppDataLayout) -> RemovalReport {
    remove_factory_reset_data_with_remover(layout, &remove_file_if_exists)
}

/// Removes the extra config file and the regular files directly inside the
/// data directory. Files that cannot be removed, typically because they are
/// still open, are recorded as skipped.
pub fn remove_factory_reset_data_with_remover(
    layout: &AppDataLayout,
    remover: &dyn Fn(&Path) -> io::Result<()>,
) -> RemovalReport {
    let mut report = RemovalReport::default();
    let mut candidates = vec![layout.extra_config_path()];

    let data_dir = layout.data_dir_path();
    match fs::read_dir(&data_dir) {
        Ok(entries) => {
            let mut files = entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
                .map(|entry| entry.path())
                .collect::<Vec<_>>();
            files.sort();
            candidates.extend(files);
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            log::warn!("failed to list {}: {err}", data_dir.display());
        }
    }

    for path in candidates {
        if !path.exists() {
            continue;
        }
        match remover(&path) {
            Ok(()) => report.removed.push(path),
            Err(err) => {
                log::warn!("skipped {}: {err}", path.display());
                report.skipped.push(path);
            }
        }
    }
    report
}
