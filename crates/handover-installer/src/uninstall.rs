use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use handover_core::{
    find_entry, remove_quotes, uninstaller_directory, ArchiveEntryName, InstallBlock,
    ProductConfig, StepOutcome,
};
use handover_settings::{read_with_fallback, RegistryView, SettingsStore};
use log::{debug, error, info, warn};

use crate::app_control::{AppControl, KillResult};
use crate::archive::{ArchiveProvider, BundledArchive};
use crate::data_files::{remove_factory_reset_data_with_remover, AppDataLayout};
use crate::process::{LaunchError, ProcessRunner, INVALID_EXIT_CODE};
use crate::service::ServiceControl;

pub const BLOCK_NAME: &str = "uninstall_prev";

const PROGRESS_APP_CLOSED: u8 = 30;
const PROGRESS_SERVICE_STOPPED: u8 = 60;
const PROGRESS_UNINSTALLER_EXTRACTED: u8 = 65;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UninstallState {
    ClosingApp,
    StoppingService,
    RunningUninstaller,
    Done,
    Failed,
}

impl UninstallState {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// What the settings store records about the previous installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallDescriptor {
    pub command_line: String,
    pub is_64bit: bool,
}

/// External services the block drives. Every field is replaceable so the
/// block can run against fakes.
pub struct UninstallCollaborators {
    pub app: Box<dyn AppControl>,
    pub services: Box<dyn ServiceControl>,
    pub settings: Box<dyn SettingsStore>,
    pub runner: Box<dyn ProcessRunner>,
    pub archives: Box<dyn ArchiveProvider>,
    pub data_layout: AppDataLayout,
    pub remove_file: Box<dyn Fn(&Path) -> io::Result<()>>,
}

enum UninstallAttempt {
    NothingRecorded,
    Completed,
    RetryAfterExtraction,
    AlternateView,
}

/// Retires a previous installation before the new one is laid down.
///
/// Each call to `execute_step` does one bounded unit of work: close the
/// running application, stop its service, then run the recorded uninstaller.
/// When the recorded uninstaller is gone it is restored from the bundled
/// archive and the same state runs again on the next poll.
pub struct UninstallPrevious {
    config: ProductConfig,
    factory_reset: bool,
    weight: f64,
    state: UninstallState,
    collaborators: UninstallCollaborators,
}

impl UninstallPrevious {
    pub fn new(
        config: ProductConfig,
        factory_reset: bool,
        weight: f64,
        collaborators: UninstallCollaborators,
    ) -> Self {
        Self {
            config,
            factory_reset,
            weight,
            state: UninstallState::ClosingApp,
            collaborators,
        }
    }

    pub fn state(&self) -> UninstallState {
        self.state
    }

    pub fn is_factory_reset(&self) -> bool {
        self.factory_reset
    }

    pub fn read_descriptor(&self) -> Result<Option<UninstallDescriptor>> {
        let lookup = read_with_fallback(
            self.collaborators.settings.as_ref(),
            &self.config.uninstall_settings_key,
            &self.config.uninstall_value,
        )
        .context("failed to read the recorded uninstall command")?;
        Ok(lookup
            .filter(|found| !found.data.is_empty())
            .map(|found| UninstallDescriptor {
                command_line: found.data,
                is_64bit: found.view.is_64bit(),
            }))
    }

    fn advance(&mut self, next: UninstallState, progress: u8) -> StepOutcome {
        self.state = next;
        StepOutcome::Progress(progress)
    }

    fn fail(&mut self, err: anyhow::Error) -> StepOutcome {
        error!("{BLOCK_NAME}: {err:#}");
        self.state = UninstallState::Failed;
        StepOutcome::Failed
    }

    fn close_app(&self) -> Result<()> {
        let app = self.collaborators.app.as_ref();
        let timing = self.config.timing;

        let mut window = app.find_main_window();
        if let Some(handle) = window {
            info!(
                "{BLOCK_NAME}: {} is running, requesting close",
                self.config.app_name
            );
            app.broadcast_activate(handle);
        }

        let started = Instant::now();
        while let Some(handle) = window {
            if started.elapsed() < timing.close_timeout() {
                app.post_close(handle);
                thread::sleep(timing.poll_interval());
                window = app.find_main_window();
                continue;
            }

            warn!(
                "{BLOCK_NAME}: {} did not close within {}ms, killing {}",
                self.config.app_name, timing.close_timeout_ms, self.config.exe_name
            );
            match app
                .force_kill(&self.config.exe_name)
                .context("failed to start the kill tool")?
            {
                KillResult::Failed(code) => {
                    bail!("unable to kill {} ({code})", self.config.exe_name)
                }
                KillResult::Killed | KillResult::NoProcess => {
                    info!("{BLOCK_NAME}: {} was killed", self.config.exe_name);
                    break;
                }
            }
        }

        thread::sleep(timing.settle_delay());
        Ok(())
    }

    fn stop_service(&self) {
        let name = &self.config.service_name;
        match self.collaborators.services.stop(name) {
            Ok(()) => info!("{BLOCK_NAME}: stopped service {name}"),
            Err(err) => warn!("{BLOCK_NAME}: stop service {name}: {err}"),
        }
    }

    fn run_uninstaller(&self) -> Result<UninstallAttempt> {
        let Some(descriptor) = self.read_descriptor()? else {
            info!("{BLOCK_NAME}: no previous installation recorded");
            return Ok(UninstallAttempt::NothingRecorded);
        };
        debug!(
            "{BLOCK_NAME}: recorded uninstaller {} ({})",
            descriptor.command_line,
            if descriptor.is_64bit { "native" } else { "32-bit" }
        );

        if self.factory_reset {
            self.reset_user_data();
        } else {
            self.clear_user_id();
        }

        match self.launch_uninstaller(&descriptor) {
            Ok(()) => Ok(UninstallAttempt::Completed),
            Err(err) if err.is_not_found() => {
                warn!("{BLOCK_NAME}: {err}");
                if !descriptor.is_64bit {
                    info!(
                        "{BLOCK_NAME}: previous install is recorded in the 32-bit view, not using the bundled uninstaller"
                    );
                    return Ok(UninstallAttempt::AlternateView);
                }
                let extracted = self
                    .extract_uninstaller(&descriptor)
                    .context("could not extract uninstaller")?;
                info!(
                    "{BLOCK_NAME}: extracted {}, trying again",
                    extracted.display()
                );
                Ok(UninstallAttempt::RetryAfterExtraction)
            }
            Err(err) => {
                let code = err.os_code();
                Err(anyhow!(err).context(format!("uninstaller failed (os error {code})")))
            }
        }
    }

    fn reset_user_data(&self) {
        let key = &self.config.app_settings_key;
        if let Err(err) = self
            .collaborators
            .settings
            .remove_tree(RegistryView::Native, key)
        {
            warn!("{BLOCK_NAME}: failed to remove settings {key}: {err:#}");
        }
        let report = remove_factory_reset_data_with_remover(
            &self.collaborators.data_layout,
            self.collaborators.remove_file.as_ref(),
        );
        info!(
            "{BLOCK_NAME}: factory reset removed {} file(s), skipped {}",
            report.removed.len(),
            report.skipped.len()
        );
    }

    fn clear_user_id(&self) {
        let key = &self.config.app_settings_key;
        let value = &self.config.user_id_value;
        if let Err(err) = self
            .collaborators
            .settings
            .write(RegistryView::Native, key, value, "")
        {
            warn!("{BLOCK_NAME}: failed to clear {value} under {key}: {err:#}");
        }
    }

    fn launch_uninstaller(&self, descriptor: &UninstallDescriptor) -> Result<(), LaunchError> {
        let program = Path::new(remove_quotes(&descriptor.command_line));
        let runner = self.collaborators.runner.as_ref();
        let exit_code = runner.run(program, &[self.config.silent_flag.as_str()])?;
        if exit_code == INVALID_EXIT_CODE {
            return Err(LaunchError::invalid_exit_code(program));
        }
        if let Some(pid) = runner.secondary_process(exit_code) {
            info!("{BLOCK_NAME}: waiting for second uninstall phase (pid {pid})");
            if !runner.wait_for_secondary(pid) {
                debug!("{BLOCK_NAME}: pid {pid} could not be opened");
            }
        }
        Ok(())
    }

    fn extract_uninstaller(&self, descriptor: &UninstallDescriptor) -> Result<PathBuf> {
        let target_dir = uninstaller_directory(&descriptor.command_line).ok_or_else(|| {
            anyhow!(
                "cannot derive uninstaller directory from '{}'",
                descriptor.command_line
            )
        })?;
        info!(
            "{BLOCK_NAME}: extracting {} from archive {}",
            self.config.uninstaller_entry, self.config.archive_name
        );
        let wanted = ArchiveEntryName::fixed_width(&self.config.uninstaller_entry);
        let mut archive = self.collaborators.archives.open(&self.config.archive_name)?;
        let extracted = extract_single_entry(archive.as_mut(), &wanted, Path::new(target_dir));
        archive.finish();
        extracted
    }
}

/// Extracts `wanted` into `target_dir`. Every listed entry is mapped to the
/// same directory so the size estimate covers the whole archive.
pub fn extract_single_entry(
    archive: &mut dyn BundledArchive,
    wanted: &ArchiveEntryName,
    target_dir: &Path,
) -> Result<PathBuf> {
    let entries = archive
        .list_entries()
        .context("failed to list archive entries")?;
    let index = find_entry(&entries, wanted)
        .ok_or_else(|| anyhow!("{wanted} is not in the archive"))?;
    let targets = vec![target_dir.to_path_buf(); entries.len()];
    let total = archive.estimate_total_size(&entries, &targets)?;
    debug!("{BLOCK_NAME}: archive holds {total} bytes in {} entries", entries.len());
    archive
        .extract_entry(index)
        .with_context(|| format!("failed to extract {wanted}"))
}

impl InstallBlock for UninstallPrevious {
    fn name(&self) -> &str {
        BLOCK_NAME
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn execute_step(&mut self) -> StepOutcome {
        match self.state {
            UninstallState::ClosingApp => match self.close_app() {
                Ok(()) => self.advance(UninstallState::StoppingService, PROGRESS_APP_CLOSED),
                Err(err) => self.fail(err),
            },
            UninstallState::StoppingService => {
                self.stop_service();
                self.advance(
                    UninstallState::RunningUninstaller,
                    PROGRESS_SERVICE_STOPPED,
                )
            }
            UninstallState::RunningUninstaller => match self.run_uninstaller() {
                Ok(UninstallAttempt::NothingRecorded | UninstallAttempt::Completed) => {
                    self.advance(UninstallState::Done, 100)
                }
                Ok(UninstallAttempt::RetryAfterExtraction) => {
                    StepOutcome::Progress(PROGRESS_UNINSTALLER_EXTRACTED)
                }
                Ok(UninstallAttempt::AlternateView) => StepOutcome::AlternateRegistryView,
                Err(err) => self.fail(err),
            },
            UninstallState::Done => StepOutcome::COMPLETE,
            UninstallState::Failed => StepOutcome::Failed,
        }
    }
}
