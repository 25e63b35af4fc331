use anyhow::{Context, Result};
use handover_core::PlanStatus;
use serde::Serialize;

use crate::dispatch::{installer_error_for, PlanRun};

/// Machine-readable summary printed by `uninstall-prev --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct UninstallReport {
    pub status: &'static str,
    pub block: Option<String>,
    pub step_code: Option<i32>,
    pub installer_error: Option<&'static str>,
    pub exit_status: u8,
    pub factory_reset: bool,
    pub progress: Vec<u8>,
}

impl UninstallReport {
    pub(crate) fn from_run(run: &PlanRun, factory_reset: bool, exit_status: u8) -> Self {
        let (status, block, step_code, installer_error) = match &run.status {
            PlanStatus::Finished => ("finished", None, None, None),
            PlanStatus::Failed { block, outcome } => (
                "failed",
                Some(block.clone()),
                Some(outcome.code()),
                Some(installer_error_for(block).as_str()),
            ),
            PlanStatus::Running { block, .. } => ("running", Some(block.clone()), None, None),
        };
        Self {
            status,
            block,
            step_code,
            installer_error,
            exit_status,
            factory_reset,
            progress: run.progress.clone(),
        }
    }

    pub(crate) fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to render uninstall report")
    }
}
