/// Entry name exactly as the bundled archive stores it.
///
/// The archive keeps names in a fixed-width record that includes the
/// terminating NUL, so two names only match when the whole record matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveEntryName(String);

impl ArchiveEntryName {
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn fixed_width(name: &str) -> Self {
        Self(format!("{name}\0"))
    }

    pub fn as_stored(&self) -> &str {
        &self.0
    }

    pub fn display_name(&self) -> &str {
        self.0.trim_end_matches('\0')
    }
}

impl std::fmt::Display for ArchiveEntryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

pub fn find_entry(entries: &[ArchiveEntryName], wanted: &ArchiveEntryName) -> Option<usize> {
    entries.iter().position(|entry| entry == wanted)
}
