use std::sync::Arc;

use anyhow::Result;

mod file_store;
mod memory;
#[cfg(windows)]
mod windows_registry;

pub use file_store::FileSettingsStore;
pub use memory::MemorySettingsStore;
#[cfg(windows)]
pub use windows_registry::WindowsRegistryStore;

/// Addressing mode of the settings store. Windows keeps separate 64-bit and
/// 32-bit trees for the same logical key; other hosts model them as two
/// independent documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegistryView {
    Native,
    Alternate32,
}

impl RegistryView {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Alternate32 => "alternate32",
        }
    }

    pub fn is_64bit(self) -> bool {
        self == Self::Native
    }
}

/// Hierarchical key-value settings, addressed by `key` (hive included) and
/// value name.
pub trait SettingsStore {
    fn read(&self, view: RegistryView, key: &str, value: &str) -> Result<Option<String>>;

    fn write(&self, view: RegistryView, key: &str, value: &str, data: &str) -> Result<()>;

    /// Removes `key` with every value and subkey below it. Missing keys are
    /// not an error.
    fn remove_tree(&self, view: RegistryView, key: &str) -> Result<()>;

    fn has_value(&self, view: RegistryView, key: &str, value: &str) -> Result<bool> {
        Ok(self.read(view, key, value)?.is_some())
    }
}

impl<T: SettingsStore + ?Sized> SettingsStore for Arc<T> {
    fn read(&self, view: RegistryView, key: &str, value: &str) -> Result<Option<String>> {
        (**self).read(view, key, value)
    }

    fn write(&self, view: RegistryView, key: &str, value: &str, data: &str) -> Result<()> {
        (**self).write(view, key, value, data)
    }

    fn remove_tree(&self, view: RegistryView, key: &str) -> Result<()> {
        (**self).remove_tree(view, key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingLookup {
    pub data: String,
    pub view: RegistryView,
}

/// Reads from the native view first and only consults the 32-bit view when
/// the native view holds no such value.
pub fn read_with_fallback(
    store: &dyn SettingsStore,
    key: &str,
    value: &str,
) -> Result<Option<SettingLookup>> {
    for view in [RegistryView::Native, RegistryView::Alternate32] {
        if let Some(data) = store.read(view, key, value)? {
            log::debug!(
                "settings: found '{value}' under {key} in {} view",
                view.as_str()
            );
            return Ok(Some(SettingLookup { data, view }));
        }
    }
    Ok(None)
}

/// Canonical form used to compare key paths: separators unified, no trailing
/// separator, ASCII case folded.
pub(crate) fn normalize_key(key: &str) -> String {
    key.replace('/', "\\")
        .trim_matches('\\')
        .to_ascii_lowercase()
}

pub(crate) fn key_is_within(candidate: &str, root: &str) -> bool {
    candidate == root
        || candidate
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('\\'))
}
