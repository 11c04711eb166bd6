use chrono::{DateTime, Utc};

use crate::model::LabStep;

/// A deferred step transition that fires exactly once.
///
/// Timer expiry, an explicit action and a narration callback may all race to
/// fire it; the first one wins and later calls return `None`. The owner must
/// still check that the session is in `from` before applying `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransition {
    from: LabStep,
    to: LabStep,
    due_at: DateTime<Utc>,
    consumed: bool,
}

impl PendingTransition {
    #[must_use]
    pub fn new(from: LabStep, to: LabStep, due_at: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            due_at,
            consumed: false,
        }
    }

    #[must_use]
    pub fn from(&self) -> LabStep {
        self.from
    }

    #[must_use]
    pub fn to(&self) -> LabStep {
        self.to
    }

    #[must_use]
    pub fn due_at(&self) -> DateTime<Utc> {
        self.due_at
    }

    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.consumed && now >= self.due_at
    }

    /// Timer trigger: fires once `now` reaches `due_at`.
    pub fn fire_if_due(&mut self, now: DateTime<Utc>) -> Option<LabStep> {
        if self.is_due(now) {
            self.fire_now()
        } else {
            None
        }
    }

    /// Action or callback trigger: fires immediately unless already consumed.
    pub fn fire_now(&mut self) -> Option<LabStep> {
        if self.consumed {
            return None;
        }
        self.consumed = true;
        Some(self.to)
    }
}
