use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::LabId;

/// Highest score a completion can record.
pub const MAX_SCORE: u8 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("score must be between 0 and 100, got {0}")]
    ScoreOutOfRange(u8),
}

/// Persistent proof that a learner finished a lab.
///
/// Created once per lab on the first passing quiz; later play never
/// overwrites it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CompletionRecordRepr")]
pub struct CompletionRecord {
    lab_id: LabId,
    completed_at: DateTime<Utc>,
    score: u8,
    xp_earned: u32,
    time_spent_secs: u64,
}

/// Unchecked wire shape; deserialization goes through `CompletionRecord::new`.
#[derive(Deserialize)]
struct CompletionRecordRepr {
    lab_id: LabId,
    completed_at: DateTime<Utc>,
    score: u8,
    xp_earned: u32,
    time_spent_secs: u64,
}

impl TryFrom<CompletionRecordRepr> for CompletionRecord {
    type Error = CompletionError;

    fn try_from(raw: CompletionRecordRepr) -> Result<Self, Self::Error> {
        Self::new(
            raw.lab_id,
            raw.score,
            raw.xp_earned,
            raw.time_spent_secs,
            raw.completed_at,
        )
    }
}

impl CompletionRecord {
    /// Create a new completion record.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::ScoreOutOfRange` if `score` exceeds 100.
    pub fn new(
        lab_id: LabId,
        score: u8,
        xp_earned: u32,
        time_spent_secs: u64,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, CompletionError> {
        if score > MAX_SCORE {
            return Err(CompletionError::ScoreOutOfRange(score));
        }
        Ok(Self {
            lab_id,
            completed_at,
            score,
            xp_earned,
            time_spent_secs,
        })
    }

    /// Rehydrate a record from storage, re-checking the score range.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::ScoreOutOfRange` if `score` exceeds 100.
    pub fn from_persisted(
        lab_id: LabId,
        completed_at: DateTime<Utc>,
        score: u8,
        xp_earned: u32,
        time_spent_secs: u64,
    ) -> Result<Self, CompletionError> {
        Self::new(lab_id, score, xp_earned, time_spent_secs, completed_at)
    }

    #[must_use]
    pub fn lab_id(&self) -> &LabId {
        &self.lab_id
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn xp_earned(&self) -> u32 {
        self.xp_earned
    }

    #[must_use]
    pub fn time_spent_secs(&self) -> u64 {
        self.time_spent_secs
    }
}

/// Converts a completion score into XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpPolicy {
    base_xp: u32,
}

impl XpPolicy {
    pub const DEFAULT_BASE_XP: u32 = 100;

    #[must_use]
    pub fn new(base_xp: u32) -> Self {
        Self { base_xp }
    }

    #[must_use]
    pub fn base_xp(&self) -> u32 {
        self.base_xp
    }

    /// `base_xp * score / 100`, rounded down. Scores above 100 are capped.
    #[must_use]
    pub fn xp_for(&self, score: u8) -> u32 {
        let score = u64::from(score.min(MAX_SCORE));
        let xp = u64::from(self.base_xp) * score / u64::from(MAX_SCORE);
        u32::try_from(xp).unwrap_or(u32::MAX)
    }
}

impl Default for XpPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_XP)
    }
}
