use lab_core::model::LabStep;

/// Aggregated view of a lab session, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabProgress {
    pub step: LabStep,
    pub supplies_collected: usize,
    pub supplies_required: usize,
    pub trials_completed: usize,
    pub trials_required: usize,
    pub quiz_answered: usize,
    pub quiz_questions: usize,
    pub quiz_attempts: u32,
    pub quiz_score: Option<u32>,
    pub xp_earned: Option<u32>,
}

impl LabProgress {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.step.is_terminal()
    }
}
