//! Lab simulations and their catalog definitions.
//!
//! Each lab pairs a `LabDefinition` (supplies, quiz, pacing) with an
//! `Experiment` implementation holding the lab-specific simulation state.
//! Derived quantities are computed by pure functions of the inputs.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use thiserror::Error;

use crate::model::{LabId, QuizQuestion, ScorePolicy, SupplyItem};

pub mod catalog;
pub mod flame;
pub mod refraction;
pub mod titration;
pub mod water;

pub use catalog::LabKind;

/// Seconds the results step stays on screen before the quiz opens by itself.
pub const RESULTS_DELAY_SECS: i64 = 25;
/// Seconds the celebration shows before a passed quiz moves to completion.
pub const CELEBRATION_DELAY_SECS: i64 = 2;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Rejected experiment actions. The simulation state is left unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExperimentError {
    #[error("another trial is already in progress")]
    TrialInProgress,
    #[error("start a trial first")]
    NoActiveTrial,
    #[error("trial {0} does not exist")]
    UnknownTrial(usize),
    #[error("trial {0} is already complete")]
    TrialAlreadyComplete(usize),
    #[error("keep adding base until the indicator changes colour")]
    NotNeutralised,
    #[error("the burette is empty")]
    BuretteEmpty,
    #[error("select a sample first")]
    NoSampleSelected,
    #[error("wait for the current run to finish")]
    Busy,
}

//
// ─── EXPERIMENT ───────────────────────────────────────────────────────────────
//

/// Observation produced by an experiment action or tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<O> {
    pub observation: O,
    /// Message for the narrator, if this step deserves one.
    pub narration: Option<String>,
    /// True if this outcome finished one of the required trials.
    pub trial_completed: bool,
}

impl<O> Outcome<O> {
    #[must_use]
    pub fn quiet(observation: O) -> Self {
        Self {
            observation,
            narration: None,
            trial_completed: false,
        }
    }

    #[must_use]
    pub fn narrated(observation: O, narration: impl Into<String>) -> Self {
        Self {
            observation,
            narration: Some(narration.into()),
            trial_completed: false,
        }
    }

    #[must_use]
    pub fn completing_trial(mut self) -> Self {
        self.trial_completed = true;
        self
    }
}

/// Lab-specific simulation driven by the step state machine.
///
/// Implementations must leave their state untouched when `apply` fails.
pub trait Experiment: fmt::Debug + Send {
    type Action: fmt::Debug;
    type Observation: fmt::Debug + Clone;

    /// Trials needed before the results step unlocks.
    fn required_trials(&self) -> usize;

    fn completed_trials(&self) -> usize;

    /// Apply a learner action.
    ///
    /// # Errors
    ///
    /// Returns `ExperimentError` when the action is not valid right now.
    fn apply(
        &mut self,
        action: Self::Action,
        now: DateTime<Utc>,
    ) -> Result<Outcome<Self::Observation>, ExperimentError>;

    /// Advance time-driven behaviour (heating ramps, reaction delays).
    fn tick(&mut self, _now: DateTime<Utc>) -> Option<Outcome<Self::Observation>> {
        None
    }

    /// Return to the pristine state, dropping any running timers.
    fn reset(&mut self);

    fn is_finished(&self) -> bool {
        self.completed_trials() >= self.required_trials()
    }
}

//
// ─── DEFINITION ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Physics,
    Chemistry,
}

impl Subject {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
        }
    }
}

/// Static description of a lab: shelf, quiz and pacing.
#[derive(Debug, Clone)]
pub struct LabDefinition {
    pub id: LabId,
    pub title: String,
    pub subject: Subject,
    pub description: String,
    pub objective: String,
    pub intro_message: String,
    pub supplies: Vec<SupplyItem>,
    pub has_setup: bool,
    pub questions: Vec<QuizQuestion>,
    pub results_delay: Duration,
    pub celebration_delay: Duration,
    pub score_policy: ScorePolicy,
}

impl LabDefinition {
    #[must_use]
    pub fn with_score_policy(mut self, policy: ScorePolicy) -> Self {
        self.score_policy = policy;
        self
    }

}
