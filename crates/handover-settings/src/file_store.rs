use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::memory::SettingsTree;
use crate::{RegistryView, SettingsStore};

const SETTINGS_FILE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default = "settings_file_version")]
    version: u32,
    #[serde(default)]
    keys: SettingsTree,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            version: settings_file_version(),
            keys: SettingsTree::default(),
        }
    }
}

/// Settings persisted as one TOML document per view under `root`, for hosts
/// without a system registry.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    root: PathBuf,
}

impl FileSettingsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn view_path(&self, view: RegistryView) -> PathBuf {
        self.root.join(format!("{}.toml", view.as_str()))
    }

    fn load(&self, view: RegistryView) -> Result<SettingsFile> {
        let path = self.view_path(view);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(SettingsFile::default())
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read settings file: {}", path.display()));
            }
        };

        let parsed: SettingsFile = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file: {}", path.display()))?;
        if parsed.version != SETTINGS_FILE_VERSION {
            anyhow::bail!(
                "unsupported settings file version {} (expected {}): {}",
                parsed.version,
                SETTINGS_FILE_VERSION,
                path.display()
            );
        }
        Ok(parsed)
    }

    fn store(&self, view: RegistryView, file: &SettingsFile) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        let path = self.view_path(view);
        let rendered = toml::to_string(file).context("failed to render settings file")?;
        fs::write(&path, rendered.as_bytes())
            .with_context(|| format!("failed to write settings file: {}", path.display()))
    }
}

impl SettingsStore for FileSettingsStore {
    fn read(&self, view: RegistryView, key: &str, value: &str) -> Result<Option<String>> {
        let file = self.load(view)?;
        Ok(file.keys.get(key, value).cloned())
    }

    fn write(&self, view: RegistryView, key: &str, value: &str, data: &str) -> Result<()> {
        let mut file = self.load(view)?;
        file.keys.set(key, value, data);
        self.store(view, &file)
    }

    fn remove_tree(&self, view: RegistryView, key: &str) -> Result<()> {
        if !self.view_path(view).exists() {
            return Ok(());
        }
        let mut file = self.load(view)?;
        if file.keys.remove_tree(key) > 0 {
            self.store(view, &file)?;
        }
        Ok(())
    }
}

fn settings_file_version() -> u32 {
    SETTINGS_FILE_VERSION
}
