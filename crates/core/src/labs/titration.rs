//! Acid-base titration: 25 mL of 1M HCl neutralised with NaOH from a burette.

use chrono::{DateTime, Duration, Utc};

use super::{
    CELEBRATION_DELAY_SECS, Experiment, ExperimentError, LabDefinition, Outcome,
    RESULTS_DELAY_SECS, Subject,
};
use crate::model::{LabId, QuizQuestion, ScorePolicy, SupplyItem};

pub const LAB_SLUG: &str = "acid-base-neutralization";

pub const ACID_VOLUME_ML: u32 = 25;
pub const EQUIVALENCE_POINT_ML: u32 = 25;
/// Within this many mL below equivalence the indicator turns orange.
pub const NEAR_EQUIVALENCE_ML: u32 = 5;
pub const BASE_INCREMENT_ML: u32 = 1;
pub const BURETTE_CAPACITY_ML: u32 = 50;
pub const TRIALS: usize = 3;

const MAX_PH: f64 = 13.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorColor {
    Red,
    Orange,
    Yellow,
    Green,
}

impl IndicatorColor {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            IndicatorColor::Red => "red",
            IndicatorColor::Orange => "orange",
            IndicatorColor::Yellow => "yellow",
            IndicatorColor::Green => "green",
        }
    }
}

/// Visual stage of the flask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TitrationStage {
    Setup,
    AddingBase,
    /// Exactly at the equivalence point; the trial can be completed.
    Equivalence,
    /// Past the equivalence point.
    Overshot,
}

/// Flask reading for a given volume of added base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TitrationReading {
    pub base_ml: u32,
    pub ph: f64,
    pub color: IndicatorColor,
    pub stage: TitrationStage,
}

/// Pure pH/indicator model.
///
/// Staged thresholds: far from equivalence (red) the reading is
/// `7 - (25 - v) / 20`, in the orange band just before it `1 + v / 10`.
/// Exactly at equivalence it is 7, then it rises by 1 per 15 mL of excess
/// base, capped at 13.
#[must_use]
pub fn reading(base_ml: u32) -> TitrationReading {
    let volume = f64::from(base_ml);
    let (ph, color, stage) = if base_ml == 0 {
        (1.0, IndicatorColor::Red, TitrationStage::Setup)
    } else if base_ml < EQUIVALENCE_POINT_ML - NEAR_EQUIVALENCE_ML {
        let shortfall = f64::from(EQUIVALENCE_POINT_ML - base_ml);
        (
            (7.0 - shortfall / 20.0).min(7.0),
            IndicatorColor::Red,
            TitrationStage::AddingBase,
        )
    } else if base_ml < EQUIVALENCE_POINT_ML {
        (
            (1.0 + volume / 10.0).min(7.0),
            IndicatorColor::Orange,
            TitrationStage::AddingBase,
        )
    } else if base_ml == EQUIVALENCE_POINT_ML {
        (7.0, IndicatorColor::Yellow, TitrationStage::Equivalence)
    } else {
        let excess = f64::from(base_ml - EQUIVALENCE_POINT_ML);
        (
            (7.0 + excess / 15.0).min(MAX_PH),
            IndicatorColor::Green,
            TitrationStage::Overshot,
        )
    };
    TitrationReading {
        base_ml,
        ph,
        color,
        stage,
    }
}

/// One row of the results table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TitrationTrial {
    pub acid_ml: u32,
    pub base_ml: u32,
    pub end_point_ml: u32,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitrationAction {
    /// Begin trial `n` (1-based).
    Start(usize),
    AddBase,
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TitrationObservation {
    Started { trial: usize },
    Reading(TitrationReading),
    TrialComplete { trial: usize, base_ml: u32 },
}

/// Three-trial titration bench.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Titration {
    trials: [TitrationTrial; TRIALS],
    active: Option<usize>,
    base_ml: u32,
}

impl Titration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn trials(&self) -> &[TitrationTrial] {
        &self.trials
    }

    /// Active trial number (1-based).
    #[must_use]
    pub fn active_trial(&self) -> Option<usize> {
        self.active.map(|idx| idx + 1)
    }

    #[must_use]
    pub fn current(&self) -> TitrationReading {
        reading(self.base_ml)
    }

    fn start(&mut self, trial: usize) -> Result<Outcome<TitrationObservation>, ExperimentError> {
        if self.active.is_some() {
            return Err(ExperimentError::TrialInProgress);
        }
        let idx = trial
            .checked_sub(1)
            .filter(|idx| *idx < TRIALS)
            .ok_or(ExperimentError::UnknownTrial(trial))?;
        if self.trials[idx].completed {
            return Err(ExperimentError::TrialAlreadyComplete(trial));
        }
        self.active = Some(idx);
        self.base_ml = 0;
        Ok(Outcome::narrated(
            TitrationObservation::Started { trial },
            format!(
                "Starting Titration {trial}. We have {ACID_VOLUME_ML}mL of hydrochloric acid in the flask. \
                 Add sodium hydroxide drop by drop and watch the indicator for the equivalence point!"
            ),
        ))
    }

    fn add_base(&mut self) -> Result<Outcome<TitrationObservation>, ExperimentError> {
        if self.active.is_none() {
            return Err(ExperimentError::NoActiveTrial);
        }
        if self.base_ml + BASE_INCREMENT_ML > BURETTE_CAPACITY_ML {
            return Err(ExperimentError::BuretteEmpty);
        }
        self.base_ml += BASE_INCREMENT_ML;
        let current = reading(self.base_ml);
        let observation = TitrationObservation::Reading(current);
        let v = self.base_ml;

        let narration = match v {
            10 => Some(format!(
                "Good progress! We've added {v}mL. The solution is still strongly acidic - notice the red color persists."
            )),
            _ if v + 3 == EQUIVALENCE_POINT_ML => Some(
                "We're getting close! The color is turning orange - approaching neutralization. Add carefully now!"
                    .to_string(),
            ),
            EQUIVALENCE_POINT_ML => Some(format!(
                "Perfect! Equivalence point reached at {v}mL. The solution is neutral at pH 7 - \
                 the acid and base have reacted completely to form salt and water!"
            )),
            _ if v == EQUIVALENCE_POINT_ML + 1 => Some(
                "The solution turned green - we've gone past the equivalence point into basic territory. \
                 Precision matters in titration!"
                    .to_string(),
            ),
            _ => None,
        };

        Ok(match narration {
            Some(text) => Outcome::narrated(observation, text),
            None => Outcome::quiet(observation),
        })
    }

    fn complete(&mut self) -> Result<Outcome<TitrationObservation>, ExperimentError> {
        let idx = self.active.ok_or(ExperimentError::NoActiveTrial)?;
        let current = reading(self.base_ml);
        if current.stage < TitrationStage::Equivalence {
            return Err(ExperimentError::NotNeutralised);
        }
        self.trials[idx] = TitrationTrial {
            acid_ml: ACID_VOLUME_ML,
            base_ml: self.base_ml,
            end_point_ml: self.base_ml,
            completed: true,
        };
        self.active = None;
        let trial = idx + 1;
        let base_ml = self.base_ml;
        Ok(Outcome::narrated(
            TitrationObservation::TrialComplete { trial, base_ml },
            format!("Titration {trial} complete! Base used: {base_ml}mL"),
        )
        .completing_trial())
    }
}

impl Experiment for Titration {
    type Action = TitrationAction;
    type Observation = TitrationObservation;

    fn required_trials(&self) -> usize {
        TRIALS
    }

    fn completed_trials(&self) -> usize {
        self.trials.iter().filter(|t| t.completed).count()
    }

    fn apply(
        &mut self,
        action: TitrationAction,
        _now: DateTime<Utc>,
    ) -> Result<Outcome<TitrationObservation>, ExperimentError> {
        match action {
            TitrationAction::Start(trial) => self.start(trial),
            TitrationAction::AddBase => self.add_base(),
            TitrationAction::Complete => self.complete(),
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[must_use]
pub fn definition() -> LabDefinition {
    LabDefinition {
        id: LabId::from_catalog(LAB_SLUG),
        title: "Acid-Base Neutralization".to_string(),
        subject: Subject::Chemistry,
        description: "Master titration and learn about chemical neutralization through precise experimentation."
            .to_string(),
        objective: "Understand and perform acid-base titration accurately using pH indicators.".to_string(),
        intro_message: "Welcome to the Acid-Base Neutralization Lab! We'll perform titration - adding one solution \
                        to another until they're perfectly balanced. Let's get started!"
            .to_string(),
        supplies: vec![
            SupplyItem::new("hcl", "HCl Solution", "Hydrochloric acid"),
            SupplyItem::new("naoh", "NaOH Solution", "Sodium hydroxide"),
            SupplyItem::new("indicator", "pH Indicator", "To detect equivalence point"),
            SupplyItem::new("burette", "Burette", "For precise measurement"),
        ],
        has_setup: false,
        questions: vec![
            QuizQuestion::new(
                "In neutralization reactions, what reacts with the acid?",
                [
                    "Both a base and water to form salt and water",
                    "Only water molecules",
                    "Another acid to form a salt",
                ],
                0,
            ),
            QuizQuestion::new(
                "Why is a pH indicator essential in titration?",
                [
                    "To visibly show when equivalence point is reached",
                    "To make the reaction happen faster",
                    "To control the temperature of the solution",
                ],
                0,
            ),
            QuizQuestion::new(
                "What is the color of phenolphthalein in the acidic solution before neutralization?",
                ["Pink/Red", "Colorless", "Blue"],
                1,
            ),
        ],
        results_delay: Duration::seconds(RESULTS_DELAY_SECS),
        celebration_delay: Duration::seconds(CELEBRATION_DELAY_SECS),
        score_policy: ScorePolicy::Flat,
    }
}
