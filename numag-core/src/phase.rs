/// Top-level phases of a session
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum ExperimentPhase {
    Instructions,
    Trials,
    Farewell,
    Finished,
    Aborted,
}

impl Default for ExperimentPhase {
    fn default() -> Self {
        ExperimentPhase::Instructions
    }
}

impl ExperimentPhase {
    pub fn accepts_responses(&self) -> bool {
        matches!(self, Self::Trials)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }
}
