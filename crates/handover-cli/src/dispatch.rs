use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use handover_core::{InstallPlan, InstallerError, PlanStatus, ProductConfig, StepOutcome};
use handover_installer::{system_collaborators, HostOptions, UninstallPrevious, BLOCK_NAME};

use crate::render::{current_output_style, OutputStyle, TerminalRenderer};
use crate::report::UninstallReport;
use crate::{Cli, Commands, UninstallPrevArgs};

/// Exit status asking the caller to rerun with the 32-bit installer.
pub(crate) const ALTERNATE_VIEW_EXIT: u8 = 10;
/// Repeated polls of one block at the same progress before the run is
/// abandoned.
pub(crate) const MAX_STALLED_POLLS: usize = 3;

pub(crate) fn run_cli(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::UninstallPrev(args) => run_uninstall_prev(&args),
        Commands::ShowConfig { config } => {
            let config = load_config(&config)?;
            print!("{}", config.to_toml_string()?);
            Ok(0)
        }
    }
}

pub(crate) fn load_config(path: &Path) -> Result<ProductConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading config: {}", path.display()))?;
    ProductConfig::from_toml_str(&raw)
        .with_context(|| format!("invalid config: {}", path.display()))
}

fn run_uninstall_prev(args: &UninstallPrevArgs) -> Result<u8> {
    let config = load_config(&args.config)?;
    let options = HostOptions {
        archive_dir: args.archive_dir.clone(),
        settings_dir: args.settings_dir.clone(),
        data_root: args.data_root.clone(),
    };
    let collaborators = system_collaborators(&config, &options)?;
    let app_name = config.app_name.clone();

    let mut plan = InstallPlan::new();
    plan.push(Box::new(UninstallPrevious::new(
        config,
        args.factory_reset,
        1.0,
        collaborators,
    )));

    let style = if args.json {
        OutputStyle::Plain
    } else {
        current_output_style()
    };
    let renderer = TerminalRenderer::from_style(style);
    let mut progress = renderer.start_progress("uninstall-prev", 100);
    let run = drive_plan(&mut plan, |_, overall| progress.set(u64::from(overall)));
    let status = exit_status(&run.status);
    if status == 0 {
        progress.finish_success();
    } else {
        progress.finish_abandon();
    }

    if args.json {
        let report = UninstallReport::from_run(&run, args.factory_reset, status);
        println!("{}", report.to_json()?);
        return Ok(status);
    }

    match &run.status {
        PlanStatus::Finished => {
            renderer.print_status("ok", &format!("previous {app_name} installation retired"));
        }
        PlanStatus::Failed {
            outcome: StepOutcome::AlternateRegistryView,
            ..
        } => {
            renderer.print_status(
                "warn",
                &format!(
                    "previous {app_name} installation is registered as 32-bit; rerun with the 32-bit installer"
                ),
            );
        }
        PlanStatus::Failed { block, .. } => {
            let error = installer_error_for(block);
            renderer.print_status(
                "error",
                &format!("{block} failed ({}, code {})", error.as_str(), error.code()),
            );
        }
        PlanStatus::Running { .. } => {}
    }
    Ok(status)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlanRun {
    pub status: PlanStatus,
    pub progress: Vec<u8>,
}

/// Polls `plan` until it finishes or fails, reporting each intermediate
/// overall value. A block that keeps reporting the same value is failed.
pub(crate) fn drive_plan(plan: &mut InstallPlan, mut on_progress: impl FnMut(&str, u8)) -> PlanRun {
    let mut progress = Vec::new();
    let mut last: Option<(String, u8)> = None;
    let mut stalled = 0;
    loop {
        match plan.poll() {
            PlanStatus::Running { block, overall } => {
                let repeated = last
                    .as_ref()
                    .is_some_and(|(previous, value)| *previous == block && *value == overall);
                stalled = if repeated { stalled + 1 } else { 0 };
                if stalled >= MAX_STALLED_POLLS {
                    log::warn!("{block} is stuck at {overall}% after {} polls", stalled + 1);
                    return PlanRun {
                        status: PlanStatus::Failed {
                            block,
                            outcome: StepOutcome::Failed,
                        },
                        progress,
                    };
                }
                progress.push(overall);
                on_progress(&block, overall);
                last = Some((block, overall));
            }
            status => {
                if status == PlanStatus::Finished {
                    progress.push(plan.overall_progress());
                    on_progress("", plan.overall_progress());
                }
                return PlanRun { status, progress };
            }
        }
    }
}

pub(crate) fn installer_error_for(block: &str) -> InstallerError {
    match block {
        BLOCK_NAME => InstallerError::Uninstall,
        _ => InstallerError::Other,
    }
}

pub(crate) fn exit_status(status: &PlanStatus) -> u8 {
    match status {
        PlanStatus::Finished => 0,
        PlanStatus::Failed {
            outcome: StepOutcome::AlternateRegistryView,
            ..
        } => ALTERNATE_VIEW_EXIT,
        PlanStatus::Failed { block, .. } => installer_error_for(block).code(),
        PlanStatus::Running { .. } => InstallerError::Other.code(),
    }
}
