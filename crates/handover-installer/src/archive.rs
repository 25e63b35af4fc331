use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use handover_core::ArchiveEntryName;

/// An archive shipped alongside the installer.
///
/// Callers list the entries, register one target directory per entry with
/// `estimate_total_size`, extract what they need and then call `finish`.
pub trait BundledArchive {
    fn list_entries(&mut self) -> Result<Vec<ArchiveEntryName>>;

    fn estimate_total_size(
        &mut self,
        entries: &[ArchiveEntryName],
        target_dirs: &[PathBuf],
    ) -> Result<u64>;

    /// Extracts the entry at `index` into its registered directory and
    /// returns the written path.
    fn extract_entry(&mut self, index: usize) -> Result<PathBuf>;

    fn finish(&mut self);
}

pub trait ArchiveProvider {
    fn open(&self, logical_name: &str) -> Result<Box<dyn BundledArchive>>;
}

/// Resolves logical archive names to `<dir>/<name>.7z`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDirectoryProvider {
    dir: PathBuf,
}

impl ArchiveDirectoryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn archive_path(&self, logical_name: &str) -> PathBuf {
        self.dir.join(format!("{logical_name}.7z"))
    }
}

impl ArchiveProvider for ArchiveDirectoryProvider {
    fn open(&self, logical_name: &str) -> Result<Box<dyn BundledArchive>> {
        let path = self.archive_path(logical_name);
        if !path.is_file() {
            bail!("bundled archive not found: {}", path.display());
        }
        Ok(Box::new(SevenZipArchive::open(&path)?))
    }
}

#[derive(Debug, Clone)]
struct StoredEntry {
    name: String,
    size: u64,
    is_directory: bool,
}

#[derive(Debug)]
pub struct SevenZipArchive {
    path: PathBuf,
    entries: Vec<StoredEntry>,
    targets: Option<Vec<PathBuf>>,
}

impl SevenZipArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let archive = sevenz_rust2::Archive::open(path)
            .map_err(|err| anyhow!("failed to open 7z archive {}: {err}", path.display()))?;
        let entries = archive
            .files
            .iter()
            .map(|entry| StoredEntry {
                name: entry.name().to_string(),
                size: entry.size(),
                is_directory: entry.is_directory(),
            })
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            targets: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BundledArchive for SevenZipArchive {
    fn list_entries(&mut self) -> Result<Vec<ArchiveEntryName>> {
        Ok(self
            .entries
            .iter()
            .map(|entry| ArchiveEntryName::fixed_width(&entry.name))
            .collect())
    }

    fn estimate_total_size(
        &mut self,
        entries: &[ArchiveEntryName],
        target_dirs: &[PathBuf],
    ) -> Result<u64> {
        if entries.len() != target_dirs.len() {
            bail!(
                "archive target list has {} paths for {} entries",
                target_dirs.len(),
                entries.len()
            );
        }
        if entries.len() != self.entries.len() {
            bail!(
                "archive {} lists {} entries, got {}",
                self.path.display(),
                self.entries.len(),
                entries.len()
            );
        }
        self.targets = Some(target_dirs.to_vec());
        Ok(self.entries.iter().map(|entry| entry.size).sum())
    }

    fn extract_entry(&mut self, index: usize) -> Result<PathBuf> {
        let Some(targets) = self.targets.as_ref() else {
            bail!("archive targets must be registered before extraction");
        };
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| anyhow!("archive entry index {index} is out of range"))?
            .clone();
        if entry.is_directory {
            bail!("archive entry '{}' is a directory", entry.name);
        }
        let file_name = entry_file_name(&entry.name)?;
        let target_dir = &targets[index];
        fs::create_dir_all(target_dir).with_context(|| {
            format!("failed to create extraction dir: {}", target_dir.display())
        })?;
        let destination = target_dir.join(file_name);

        let mut reader =
            sevenz_rust2::ArchiveReader::open(&self.path, sevenz_rust2::Password::empty())
                .map_err(|err| anyhow!("failed to open 7z: {err}"))?;
        let mut written = false;
        reader
            .for_each_entries(|candidate, data| {
                if candidate.name() != entry.name {
                    return Ok(true);
                }
                let mut file = fs::File::create(&destination)?;
                std::io::copy(data, &mut file)?;
                written = true;
                Ok(false)
            })
            .map_err(|err| anyhow!("failed to extract '{}': {err}", entry.name))?;
        if !written {
            bail!(
                "archive entry '{}' has no data in {}",
                entry.name,
                self.path.display()
            );
        }
        log::debug!("extracted {} to {}", entry.name, destination.display());
        Ok(destination)
    }

    fn finish(&mut self) {
        self.targets = None;
    }
}

// Only the final component is used; stored directories are flattened.
pub(crate) fn entry_file_name(name: &str) -> Result<PathBuf> {
    let normalized = name.replace('\\', "/");
    match Path::new(&normalized).components().next_back() {
        Some(Component::Normal(file_name)) => Ok(PathBuf::from(file_name)),
        _ => Err(anyhow!("archive entry '{name}' has no usable file name")),
    }
}
