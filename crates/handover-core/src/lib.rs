mod archive;
mod block;
mod command_line;
mod config;

pub use archive::{find_entry, ArchiveEntryName};
pub use block::{InstallBlock, InstallPlan, InstallerError, PlanStatus, StepOutcome};
pub use command_line::{remove_quotes, uninstaller_directory};
pub use config::{ProductConfig, TimingConfig};

#[cfg(test)]
mod tests;
