use std::io;

use anyhow::{anyhow, Context, Result};
use winreg::enums::{
    HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_ALL_ACCESS, KEY_READ, KEY_WOW64_32KEY,
    KEY_WOW64_64KEY, KEY_WRITE,
};
use winreg::RegKey;

use crate::{RegistryView, SettingsStore};

/// System registry, with each view selected through the WOW64 access flags.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsRegistryStore;

impl WindowsRegistryStore {
    pub fn new() -> Self {
        Self
    }
}

fn view_flag(view: RegistryView) -> u32 {
    match view {
        RegistryView::Native => KEY_WOW64_64KEY,
        RegistryView::Alternate32 => KEY_WOW64_32KEY,
    }
}

fn split_hive(key: &str) -> Result<(RegKey, String)> {
    let normalized = key.replace('/', "\\");
    let (hive, path) = normalized
        .split_once('\\')
        .ok_or_else(|| anyhow!("registry key must start with a hive: {key}"))?;
    let predef = match hive.to_ascii_uppercase().as_str() {
        "HKEY_LOCAL_MACHINE" | "HKLM" => HKEY_LOCAL_MACHINE,
        "HKEY_CURRENT_USER" | "HKCU" => HKEY_CURRENT_USER,
        other => return Err(anyhow!("unsupported registry hive '{other}' in {key}")),
    };
    Ok((
        RegKey::predef(predef),
        path.trim_matches('\\').to_string(),
    ))
}

impl SettingsStore for WindowsRegistryStore {
    fn read(&self, view: RegistryView, key: &str, value: &str) -> Result<Option<String>> {
        let (hive, path) = split_hive(key)?;
        let subkey = match hive.open_subkey_with_flags(&path, KEY_READ | view_flag(view)) {
            Ok(subkey) => subkey,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to open registry key {key}"));
            }
        };
        match subkey.get_value::<String, _>(value) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed to read registry value {key}\\{value}"))
            }
        }
    }

    fn write(&self, view: RegistryView, key: &str, value: &str, data: &str) -> Result<()> {
        let (hive, path) = split_hive(key)?;
        let (subkey, _) = hive
            .create_subkey_with_flags(&path, KEY_WRITE | view_flag(view))
            .with_context(|| format!("failed to create registry key {key}"))?;
        subkey
            .set_value(value, &data.to_string())
            .with_context(|| format!("failed to write registry value {key}\\{value}"))
    }

    fn remove_tree(&self, view: RegistryView, key: &str) -> Result<()> {
        let (hive, path) = split_hive(key)?;
        let (parent_path, leaf) = match path.rsplit_once('\\') {
            Some((parent, leaf)) => (parent.to_string(), leaf.to_string()),
            None => (String::new(), path.clone()),
        };
        let parent = match hive.open_subkey_with_flags(&parent_path, KEY_ALL_ACCESS | view_flag(view))
        {
            Ok(parent) => parent,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to open registry key {key}"));
            }
        };
        match parent.delete_subkey_all(&leaf) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove registry key {key}")),
        }
    }
}
