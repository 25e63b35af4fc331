/// Result of one poll of an install block.
///
/// `code()` yields the integer form shared by all blocks: `0..=100` is
/// progress, `-1` an unrecoverable failure and `-2` the request to restart the
/// block against the other registry view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Progress(u8),
    Failed,
    AlternateRegistryView,
}

impl StepOutcome {
    pub const COMPLETE: Self = Self::Progress(100);

    pub fn code(self) -> i32 {
        match self {
            Self::Progress(value) => i32::from(value.min(100)),
            Self::Failed => -1,
            Self::AlternateRegistryView => -2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Failed),
            -2 => Some(Self::AlternateRegistryView),
            0..=100 => u8::try_from(code).ok().map(Self::Progress),
            _ => None,
        }
    }

    pub fn is_complete(self) -> bool {
        matches!(self, Self::Progress(value) if value >= 100)
    }

    pub fn is_error(self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// One unit of weighted, resumable installer work.
///
/// Callers poll `execute_step` until it reports completion; a block must
/// tolerate being abandoned between polls.
pub trait InstallBlock {
    fn name(&self) -> &str;
    fn weight(&self) -> f64;
    fn execute_step(&mut self) -> StepOutcome;
}

/// Installer error codes surfaced to the user interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallerError {
    Other = 1,
    Permission,
    Kill,
    ConnectHelper,
    Delete,
    Uninstall,
    MoveCustomDir,
    CustomDirNotEmpty,
    DeleteCustomDir,
}

impl InstallerError {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Other => "other",
            Self::Permission => "permission",
            Self::Kill => "kill",
            Self::ConnectHelper => "connect-helper",
            Self::Delete => "delete",
            Self::Uninstall => "uninstall",
            Self::MoveCustomDir => "move-custom-dir",
            Self::CustomDirNotEmpty => "custom-dir-not-empty",
            Self::DeleteCustomDir => "delete-custom-dir",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStatus {
    Running { block: String, overall: u8 },
    Finished,
    Failed { block: String, outcome: StepOutcome },
}

/// Ordered set of blocks sharing one progress bar.
#[derive(Default)]
pub struct InstallPlan {
    blocks: Vec<Box<dyn InstallBlock>>,
    current: usize,
    overall: u8,
    failure: Option<(String, StepOutcome)>,
}

impl InstallPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Box<dyn InstallBlock>) {
        self.blocks.push(block);
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn overall_progress(&self) -> u8 {
        self.overall
    }

    pub fn current_block(&self) -> Option<&str> {
        self.blocks.get(self.current).map(|block| block.name())
    }

    /// Runs one step of the current block and folds it into overall progress.
    pub fn poll(&mut self) -> PlanStatus {
        if let Some((block, outcome)) = &self.failure {
            return PlanStatus::Failed {
                block: block.clone(),
                outcome: *outcome,
            };
        }
        if self.current >= self.blocks.len() {
            self.overall = 100;
            return PlanStatus::Finished;
        }

        let block = &mut self.blocks[self.current];
        let name = block.name().to_string();
        match block.execute_step() {
            StepOutcome::Progress(local) => {
                let local = local.min(100);
                let projected = self.project(local);
                self.overall = self.overall.max(projected);
                if local >= 100 {
                    self.current += 1;
                }
                if self.current >= self.blocks.len() {
                    self.overall = 100;
                    return PlanStatus::Finished;
                }
                PlanStatus::Running {
                    block: name,
                    overall: self.overall,
                }
            }
            outcome => {
                self.failure = Some((name.clone(), outcome));
                PlanStatus::Failed {
                    block: name,
                    outcome,
                }
            }
        }
    }

    fn project(&self, local: u8) -> u8 {
        let weights = self.effective_weights();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return 0;
        }
        let done: f64 = weights[..self.current].iter().sum();
        let current = weights[self.current] * f64::from(local) / 100.0;
        let overall = ((done + current) / total * 100.0 + 1e-9).floor();
        overall.clamp(0.0, 100.0) as u8
    }

    // Non-positive or non-finite weights count as one share each.
    fn effective_weights(&self) -> Vec<f64> {
        self.blocks
            .iter()
            .map(|block| {
                let weight = block.weight();
                if weight.is_finite() && weight > 0.0 {
                    weight
                } else {
                    1.0
                }
            })
            .collect()
    }
}
