use std::sync::Arc;

use lab_core::model::{CompletionRecord, LabId, XpPolicy};
use serde::Serialize;
use storage::repository::{
    ProgressRepository, QuizAttemptRecord, QuizAttemptRepository, StorageError,
};
use tracing::{debug, info};

use crate::Clock;
use crate::error::ProgressError;

/// Result of `mark_lab_complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReceipt {
    /// The stored record; for repeats this is the original, untouched record.
    pub record: CompletionRecord,
    /// XP granted by this call. Zero when the lab was already complete.
    pub xp_awarded: u32,
    pub newly_completed: bool,
}

/// Dashboard totals across all labs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressOverview {
    pub completions: Vec<CompletionRecord>,
    pub total_xp: u64,
    pub completed_labs: usize,
}

impl ProgressOverview {
    #[must_use]
    pub fn is_completed(&self, lab_id: &LabId) -> bool {
        self.completions.iter().any(|c| c.lab_id() == lab_id)
    }

    #[must_use]
    pub fn completion(&self, lab_id: &LabId) -> Option<&CompletionRecord> {
        self.completions.iter().find(|c| c.lab_id() == lab_id)
    }
}

/// Progress store facade: per-lab completion records and the quiz attempt log.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    xp: XpPolicy,
    progress: Arc<dyn ProgressRepository>,
    attempts: Arc<dyn QuizAttemptRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        attempts: Arc<dyn QuizAttemptRepository>,
    ) -> Self {
        Self {
            clock,
            xp: XpPolicy::default(),
            progress,
            attempts,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_xp_policy(mut self, xp: XpPolicy) -> Self {
        self.xp = xp;
        self
    }

    #[must_use]
    pub fn xp_policy(&self) -> XpPolicy {
        self.xp
    }

    /// Record a lab as complete, awarding XP only the first time.
    ///
    /// Repeated calls for the same lab leave the stored record untouched and
    /// return it with `xp_awarded == 0`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Completion` for scores above 100 and
    /// `ProgressError::Storage` if persistence fails.
    pub async fn mark_lab_complete(
        &self,
        lab_id: &LabId,
        score: u8,
        time_spent_secs: u64,
    ) -> Result<CompletionReceipt, ProgressError> {
        let xp = self.xp.xp_for(score);
        let record = CompletionRecord::new(
            lab_id.clone(),
            score,
            xp,
            time_spent_secs,
            self.clock.now(),
        )?;

        if self.progress.insert_completion_if_absent(&record).await? {
            info!(lab_id = %lab_id, score, xp, time_spent_secs, "lab completed");
            return Ok(CompletionReceipt {
                record,
                xp_awarded: xp,
                newly_completed: true,
            });
        }

        let existing = self
            .progress
            .get_completion(lab_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        debug!(lab_id = %lab_id, "lab already complete; no xp awarded");
        Ok(CompletionReceipt {
            record: existing,
            xp_awarded: 0,
            newly_completed: false,
        })
    }

    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the lookup fails.
    pub async fn is_lab_completed(&self, lab_id: &LabId) -> Result<bool, ProgressError> {
        Ok(self.progress.get_completion(lab_id).await?.is_some())
    }

    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the lookup fails.
    pub async fn get_lab_completion(
        &self,
        lab_id: &LabId,
    ) -> Result<Option<CompletionRecord>, ProgressError> {
        Ok(self.progress.get_completion(lab_id).await?)
    }

    /// All completions with XP totals.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the listing fails.
    pub async fn overview(&self) -> Result<ProgressOverview, ProgressError> {
        let completions = self.progress.list_completions().await?;
        let total_xp = completions
            .iter()
            .map(|c| u64::from(c.xp_earned()))
            .sum();
        Ok(ProgressOverview {
            completed_labs: completions.len(),
            total_xp,
            completions,
        })
    }

    /// Append a graded quiz attempt to the log.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the attempt cannot be stored.
    pub async fn record_attempt(&self, attempt: &QuizAttemptRecord) -> Result<i64, ProgressError> {
        Ok(self.attempts.append_attempt(attempt).await?)
    }

    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the listing fails.
    pub async fn attempts_for(
        &self,
        lab_id: &LabId,
    ) -> Result<Vec<QuizAttemptRecord>, ProgressError> {
        Ok(self.attempts.attempts_for_lab(lab_id).await?)
    }
}
