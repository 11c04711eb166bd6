//! Flame test: identify metal ions by the colour they give a Bunsen flame.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::{
    CELEBRATION_DELAY_SECS, Experiment, ExperimentError, LabDefinition, Outcome,
    RESULTS_DELAY_SECS, Subject,
};
use crate::model::{LabId, QuizQuestion, ScorePolicy, SupplyItem};

pub const LAB_SLUG: &str = "flame-test";

/// Intensity gained per heating step.
pub const HEAT_STEP_PERCENT: u8 = 5;
pub const HEAT_STEP_MILLIS: i64 = 50;
pub const FULL_INTENSITY: u8 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown metal salt: {0}")]
pub struct UnknownSalt(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetalSalt {
    LithiumChloride,
    SodiumChloride,
    PotassiumChloride,
    CopperSulfate,
    CalciumChloride,
    BariumChloride,
}

impl MetalSalt {
    pub const ALL: [MetalSalt; 6] = [
        MetalSalt::LithiumChloride,
        MetalSalt::SodiumChloride,
        MetalSalt::PotassiumChloride,
        MetalSalt::CopperSulfate,
        MetalSalt::CalciumChloride,
        MetalSalt::BariumChloride,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    #[must_use]
    pub fn info(self) -> SaltInfo {
        match self {
            MetalSalt::LithiumChloride => SaltInfo {
                salt: self,
                name: "Lithium Chloride",
                ion: "Li+",
                flame_color: "Crimson Red",
                hex: "#DC143C",
                spectral_line_nm: 670,
                description: "Bright red flame, easily identifiable",
            },
            MetalSalt::SodiumChloride => SaltInfo {
                salt: self,
                name: "Sodium Chloride",
                ion: "Na+",
                flame_color: "Intense Yellow",
                hex: "#FFD700",
                spectral_line_nm: 589,
                description: "Very bright yellow-orange, most intense",
            },
            MetalSalt::PotassiumChloride => SaltInfo {
                salt: self,
                name: "Potassium Chloride",
                ion: "K+",
                flame_color: "Lilac Purple",
                hex: "#C084FC",
                spectral_line_nm: 766,
                description: "Pale violet, harder to see",
            },
            MetalSalt::CopperSulfate => SaltInfo {
                salt: self,
                name: "Copper Sulfate",
                ion: "Cu2+",
                flame_color: "Blue-Green",
                hex: "#14B8A6",
                spectral_line_nm: 515,
                description: "Distinctive blue-green color",
            },
            MetalSalt::CalciumChloride => SaltInfo {
                salt: self,
                name: "Calcium Chloride",
                ion: "Ca2+",
                flame_color: "Orange-Red",
                hex: "#FF4500",
                spectral_line_nm: 622,
                description: "Brick red-orange flame",
            },
            MetalSalt::BariumChloride => SaltInfo {
                salt: self,
                name: "Barium Chloride",
                ion: "Ba2+",
                flame_color: "Pale Green",
                hex: "#90EE90",
                spectral_line_nm: 524,
                description: "Yellowish-green flame",
            },
        }
    }
}

impl fmt::Display for MetalSalt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetalSalt {
    type Err = UnknownSalt;

    /// Accepts the display name ("Sodium Chloride") or its kebab-case form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', " ");
        MetalSalt::ALL
            .into_iter()
            .find(|salt| salt.name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| UnknownSalt(s.to_string()))
    }
}

/// Row of the flame colour reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaltInfo {
    pub salt: MetalSalt,
    pub name: &'static str,
    pub ion: &'static str,
    pub flame_color: &'static str,
    pub hex: &'static str,
    pub spectral_line_nm: u32,
    pub description: &'static str,
}

/// Linear heating ramp: +5% every 50 ms, capped at 100%.
#[must_use]
pub fn intensity_after(elapsed: Duration) -> u8 {
    let steps = (elapsed.num_milliseconds() / HEAT_STEP_MILLIS).max(0);
    let percent = steps.saturating_mul(i64::from(HEAT_STEP_PERCENT));
    u8::try_from(percent.min(i64::from(FULL_INTENSITY))).unwrap_or(FULL_INTENSITY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlameAction {
    Select(MetalSalt),
    StartHeating,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlameObservation {
    Loaded(MetalSalt),
    Heating { intensity: u8 },
    Observed(SaltInfo),
}

/// Bunsen burner bench with a wire loop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlameTest {
    selected: Option<MetalSalt>,
    heating_since: Option<DateTime<Utc>>,
    intensity: u8,
    observed: Option<SaltInfo>,
    history: Vec<SaltInfo>,
}

impl FlameTest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn selected(&self) -> Option<MetalSalt> {
        self.selected
    }

    #[must_use]
    pub fn intensity(&self) -> u8 {
        self.intensity
    }

    #[must_use]
    pub fn is_heating(&self) -> bool {
        self.heating_since.is_some()
    }

    /// Flame colour, visible only once the sample is fully heated.
    #[must_use]
    pub fn visible_flame(&self) -> Option<&SaltInfo> {
        self.observed.as_ref()
    }

    /// Salts observed so far, one entry per salt.
    #[must_use]
    pub fn history(&self) -> &[SaltInfo] {
        &self.history
    }
}

impl Experiment for FlameTest {
    type Action = FlameAction;
    type Observation = FlameObservation;

    fn required_trials(&self) -> usize {
        1
    }

    fn completed_trials(&self) -> usize {
        self.history.len()
    }

    fn apply(
        &mut self,
        action: FlameAction,
        now: DateTime<Utc>,
    ) -> Result<Outcome<FlameObservation>, ExperimentError> {
        if self.is_heating() {
            return Err(ExperimentError::Busy);
        }
        match action {
            FlameAction::Select(salt) => {
                self.selected = Some(salt);
                self.intensity = 0;
                self.observed = None;
                Ok(Outcome::narrated(
                    FlameObservation::Loaded(salt),
                    format!(
                        "{salt} loaded on the nichrome wire loop. The wire must be clean to avoid contamination. \
                         Now we're ready to heat it!"
                    ),
                ))
            }
            FlameAction::StartHeating => {
                if self.selected.is_none() {
                    return Err(ExperimentError::NoSampleSelected);
                }
                self.heating_since = Some(now);
                self.intensity = 0;
                self.observed = None;
                Ok(Outcome::narrated(
                    FlameObservation::Heating { intensity: 0 },
                    "Holding the loop in the hottest part of the flame. Watch the colour carefully!",
                ))
            }
        }
    }

    fn tick(&mut self, now: DateTime<Utc>) -> Option<Outcome<FlameObservation>> {
        let since = self.heating_since?;
        let salt = self.selected?;
        let intensity = intensity_after(now.signed_duration_since(since));
        if intensity == self.intensity {
            return None;
        }
        self.intensity = intensity;
        if intensity < FULL_INTENSITY {
            return Some(Outcome::quiet(FlameObservation::Heating { intensity }));
        }

        // Ramp finished: stop heating so no further ticks are produced.
        self.heating_since = None;
        let info = salt.info();
        self.observed = Some(info);
        let first_time = !self.history.iter().any(|seen| seen.salt == salt);
        if first_time {
            self.history.push(info);
        }
        let outcome = Outcome::narrated(
            FlameObservation::Observed(info),
            format!(
                "{} flame observed for {}! Its characteristic line sits at {} nm.",
                info.flame_color, info.ion, info.spectral_line_nm
            ),
        );
        Some(if first_time {
            outcome.completing_trial()
        } else {
            outcome
        })
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[must_use]
pub fn definition() -> LabDefinition {
    LabDefinition {
        id: LabId::from_catalog(LAB_SLUG),
        title: "Flame Test".to_string(),
        subject: Subject::Chemistry,
        description: "Identify metal ions by the color they produce in a flame.".to_string(),
        objective: "Understand how electrons emit characteristic wavelengths of light and use this for metal identification."
            .to_string(),
        intro_message: "Welcome to the Flame Test Laboratory! Today we will identify different metal ions by observing \
                        the colors they produce when heated. Each metal has a unique color signature."
            .to_string(),
        supplies: vec![
            SupplyItem::new("nichrome-loop", "Nichrome Wire Loop", "Holds the sample in the flame"),
            SupplyItem::new("bunsen-burner", "Bunsen Burner", "Provides a hot, non-luminous flame"),
            SupplyItem::new("salt-samples", "Metal Salt Samples", "Six chlorides and sulfates to test"),
            SupplyItem::new("goggles", "Safety Goggles", "Protect your eyes from spitting salts"),
        ],
        has_setup: false,
        questions: vec![
            QuizQuestion::new(
                "What causes the different colors in a flame test?",
                [
                    "The salt itself is burning",
                    "Electrons moving between energy levels",
                    "Reaction with air",
                    "Temperature of flame",
                ],
                1,
            ),
            QuizQuestion::new(
                "Which flame color identifies sodium ions?",
                ["Crimson Red", "Lilac Purple", "Intense Yellow", "Blue-Green"],
                2,
            ),
            QuizQuestion::new(
                "Why does each metal give a different color?",
                [
                    "Each metal has a unique electron configuration",
                    "Each metal burns at a different temperature",
                    "The wire loop changes color",
                ],
                0,
            ),
        ],
        results_delay: Duration::seconds(RESULTS_DELAY_SECS),
        celebration_delay: Duration::seconds(CELEBRATION_DELAY_SECS),
        score_policy: ScorePolicy::Flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn ramp_is_linear_and_capped() {
        assert_eq!(intensity_after(Duration::zero()), 0);
        assert_eq!(intensity_after(Duration::milliseconds(49)), 0);
        assert_eq!(intensity_after(Duration::milliseconds(50)), 5);
        assert_eq!(intensity_after(Duration::milliseconds(500)), 50);
        assert_eq!(intensity_after(Duration::milliseconds(1000)), 100);
        assert_eq!(intensity_after(Duration::seconds(30)), 100);
        assert_eq!(intensity_after(Duration::milliseconds(-200)), 0);
    }

    #[test]
    fn sodium_chloride_burns_intense_yellow() {
        let mut bench = FlameTest::new();
        let start = fixed_now();
        bench
            .apply(FlameAction::Select(MetalSalt::SodiumChloride), start)
            .unwrap();
        bench.apply(FlameAction::StartHeating, start).unwrap();

        let half = bench.tick(start + Duration::milliseconds(500)).unwrap();
        assert_eq!(half.observation, FlameObservation::Heating { intensity: 50 });
        assert!(bench.visible_flame().is_none());

        let done = bench.tick(start + Duration::seconds(1)).unwrap();
        assert!(done.trial_completed);
        let flame = bench.visible_flame().unwrap();
        assert_eq!(flame.flame_color, "Intense Yellow");
        assert_eq!(flame.ion, "Na+");
        assert_eq!(flame.spectral_line_nm, 589);
        assert!(bench.is_finished());
    }

    #[test]
    fn ramp_stops_after_full_intensity() {
        let mut bench = FlameTest::new();
        let start = fixed_now();
        bench
            .apply(FlameAction::Select(MetalSalt::LithiumChloride), start)
            .unwrap();
        bench.apply(FlameAction::StartHeating, start).unwrap();
        bench.tick(start + Duration::seconds(2)).unwrap();
        assert!(!bench.is_heating());
        assert!(bench.tick(start + Duration::seconds(3)).is_none());
    }

    #[test]
    fn heating_requires_a_sample() {
        let mut bench = FlameTest::new();
        assert_eq!(
            bench.apply(FlameAction::StartHeating, fixed_now()).unwrap_err(),
            ExperimentError::NoSampleSelected
        );
    }

    #[test]
    fn cannot_swap_salt_mid_heat() {
        let mut bench = FlameTest::new();
        bench
            .apply(FlameAction::Select(MetalSalt::BariumChloride), fixed_now())
            .unwrap();
        bench.apply(FlameAction::StartHeating, fixed_now()).unwrap();
        assert_eq!(
            bench
                .apply(FlameAction::Select(MetalSalt::SodiumChloride), fixed_now())
                .unwrap_err(),
            ExperimentError::Busy
        );
        assert_eq!(bench.selected(), Some(MetalSalt::BariumChloride));
    }

    #[test]
    fn reset_drops_running_ramp() {
        let mut bench = FlameTest::new();
        bench
            .apply(FlameAction::Select(MetalSalt::CopperSulfate), fixed_now())
            .unwrap();
        bench.apply(FlameAction::StartHeating, fixed_now()).unwrap();
        bench.reset();
        assert!(!bench.is_heating());
        assert!(bench.tick(fixed_now() + Duration::seconds(5)).is_none());
    }

    #[test]
    fn salts_parse_from_names() {
        assert_eq!(
            "Sodium Chloride".parse::<MetalSalt>().unwrap(),
            MetalSalt::SodiumChloride
        );
        assert_eq!(
            "potassium-chloride".parse::<MetalSalt>().unwrap(),
            MetalSalt::PotassiumChloride
        );
        assert!("Table Salt".parse::<MetalSalt>().is_err());
    }

    #[test]
    fn table_has_six_distinct_lines() {
        let mut lines: Vec<u32> = MetalSalt::ALL
            .iter()
            .map(|s| s.info().spectral_line_nm)
            .collect();
        lines.sort_unstable();
        lines.dedup();
        assert_eq!(lines.len(), 6);
    }
}
