//! Testing for water with anhydrous copper(II) sulfate and cobalt chloride paper.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::{
    CELEBRATION_DELAY_SECS, Experiment, ExperimentError, LabDefinition, Outcome,
    RESULTS_DELAY_SECS, Subject,
};
use crate::model::{LabId, QuizQuestion, ScorePolicy, SupplyItem};

pub const LAB_SLUG: &str = "water-test";

/// Delay between adding water and the colour change.
pub const HYDRATION_DELAY_MILLIS: i64 = 2000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown water test: {0}")]
pub struct UnknownWaterTest(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaterTest {
    CopperSulfate,
    CobaltChloride,
}

impl WaterTest {
    pub const ALL: [WaterTest; 2] = [WaterTest::CopperSulfate, WaterTest::CobaltChloride];

    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            WaterTest::CopperSulfate => "copper-sulfate",
            WaterTest::CobaltChloride => "cobalt-chloride",
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            WaterTest::CopperSulfate => "Anhydrous Copper(II) Sulfate",
            WaterTest::CobaltChloride => "Cobalt(II) Chloride Paper",
        }
    }

    /// Colour before any water is added.
    #[must_use]
    pub fn dry_color(self) -> SampleColor {
        match self {
            WaterTest::CopperSulfate => SampleColor::White,
            WaterTest::CobaltChloride => SampleColor::Blue,
        }
    }

    #[must_use]
    pub fn wet_color(self) -> SampleColor {
        match self {
            WaterTest::CopperSulfate => SampleColor::Blue,
            WaterTest::CobaltChloride => SampleColor::Pink,
        }
    }
}

impl fmt::Display for WaterTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaterTest {
    type Err = UnknownWaterTest;

    /// Accepts the kebab-case id ("copper-sulfate") or the display name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let slug = wanted.replace(' ', "-");
        WaterTest::ALL
            .into_iter()
            .find(|test| test.slug() == slug || test.name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| UnknownWaterTest(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleColor {
    White,
    Blue,
    Pink,
}

impl SampleColor {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SampleColor::White => "white",
            SampleColor::Blue => "blue",
            SampleColor::Pink => "pink",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaterTestResult {
    pub test: WaterTest,
    pub before: SampleColor,
    pub after: SampleColor,
    pub observation: &'static str,
    pub conclusion: &'static str,
}

/// Outcome of adding water to a test sample.
#[must_use]
pub fn hydrate(test: WaterTest) -> WaterTestResult {
    let (observation, conclusion) = match test {
        WaterTest::CopperSulfate => (
            "The white anhydrous copper(II) sulfate powder immediately turns bright blue when water is added!",
            "The color change from white to blue confirms the presence of water. The anhydrous (water-free) \
             form absorbs water and becomes hydrated copper(II) sulfate (CuSO4·5H2O).",
        ),
        WaterTest::CobaltChloride => (
            "The blue cobalt(II) chloride paper turns pink when touched with water droplets!",
            "The color change from blue to pink confirms water is present. Blue anhydrous cobalt chloride \
             absorbs water to form pink hydrated cobalt chloride.",
        ),
    };
    WaterTestResult {
        test,
        before: test.dry_color(),
        after: test.wet_color(),
        observation,
        conclusion,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaterAction {
    Select(WaterTest),
    AddWater,
    /// Put fresh dry samples on the bench. Recorded results are kept.
    ResetSamples,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaterObservation {
    Selected(WaterTest),
    Reacting { test: WaterTest, due_at: DateTime<Utc> },
    ColorChanged(WaterTestResult),
    SamplesReset,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WaterTestBench {
    selected: Option<WaterTest>,
    reacting: Option<(WaterTest, DateTime<Utc>)>,
    wet: Vec<WaterTest>,
    results: Vec<WaterTestResult>,
}

impl WaterTestBench {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn selected(&self) -> Option<WaterTest> {
        self.selected
    }

    #[must_use]
    pub fn is_reacting(&self) -> bool {
        self.reacting.is_some()
    }

    /// Current colour of a sample on the bench.
    #[must_use]
    pub fn color_of(&self, test: WaterTest) -> SampleColor {
        if self.wet.contains(&test) {
            test.wet_color()
        } else {
            test.dry_color()
        }
    }

    /// One result per test performed, in the order they were run.
    #[must_use]
    pub fn results(&self) -> &[WaterTestResult] {
        &self.results
    }

    #[must_use]
    pub fn has_tested_all(&self) -> bool {
        WaterTest::ALL
            .iter()
            .all(|test| self.results.iter().any(|r| r.test == *test))
    }
}

impl Experiment for WaterTestBench {
    type Action = WaterAction;
    type Observation = WaterObservation;

    fn required_trials(&self) -> usize {
        1
    }

    fn completed_trials(&self) -> usize {
        self.results.len()
    }

    fn apply(
        &mut self,
        action: WaterAction,
        now: DateTime<Utc>,
    ) -> Result<Outcome<WaterObservation>, ExperimentError> {
        if self.is_reacting() {
            return Err(ExperimentError::Busy);
        }
        match action {
            WaterAction::Select(test) => {
                self.selected = Some(test);
                Ok(Outcome::quiet(WaterObservation::Selected(test)))
            }
            WaterAction::AddWater => {
                let test = self.selected.ok_or(ExperimentError::NoSampleSelected)?;
                let due_at = now + Duration::milliseconds(HYDRATION_DELAY_MILLIS);
                self.reacting = Some((test, due_at));
                let narration = match test {
                    WaterTest::CopperSulfate => "Watch carefully as we add water to the white powder...",
                    WaterTest::CobaltChloride => {
                        "Notice how sensitive this test is - even a single drop causes the color change..."
                    }
                };
                Ok(Outcome::narrated(
                    WaterObservation::Reacting { test, due_at },
                    narration,
                ))
            }
            WaterAction::ResetSamples => {
                self.wet.clear();
                self.selected = None;
                Ok(Outcome::quiet(WaterObservation::SamplesReset))
            }
        }
    }

    fn tick(&mut self, now: DateTime<Utc>) -> Option<Outcome<WaterObservation>> {
        let (test, due_at) = self.reacting?;
        if now < due_at {
            return None;
        }
        self.reacting = None;
        if !self.wet.contains(&test) {
            self.wet.push(test);
        }
        let result = hydrate(test);
        let first_time = !self.results.iter().any(|r| r.test == test);
        if first_time {
            self.results.push(result.clone());
        }
        let narration = if self.has_tested_all() {
            "Excellent! You've completed both water tests successfully. You now know two reliable methods \
             chemists use to detect water. Let's analyze what we learned!"
        } else {
            "Great work on your first test! Now try the other test to see a different color change reaction."
        };
        let outcome = Outcome::narrated(WaterObservation::ColorChanged(result), narration);
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
        title: "Testing for Water".to_string(),
        subject: Subject::Chemistry,
        description: "Detect water with chemical tests that change colour on hydration.".to_string(),
        objective: "Use anhydrous copper(II) sulfate and cobalt chloride paper to confirm the presence of water."
            .to_string(),
        intro_message: "Welcome to the Water Testing Lab! Today we'll learn two chemical tests that scientists \
                        use to detect water. Let's discover how chemical color changes can reveal the presence \
                        of water!"
            .to_string(),
        supplies: vec![
            SupplyItem::new("copper-sulfate", "Anhydrous Copper Sulfate", "White powder that turns blue with water"),
            SupplyItem::new("cobalt-paper", "Cobalt Chloride Paper", "Blue paper that turns pink with water"),
            SupplyItem::new("dropper", "Water Dropper", "Adds water one drop at a time"),
            SupplyItem::new("test-tubes", "Test Tubes", "Hold the samples"),
            SupplyItem::new("water", "Distilled Water", "The substance we are testing for"),
            SupplyItem::new("goggles", "Safety Goggles", "Protect your eyes"),
        ],
        has_setup: true,
        questions: vec![
            QuizQuestion::new(
                "What color does anhydrous copper(II) sulfate turn in the presence of water?",
                ["Remains white", "Turns blue", "Turns green", "Turns red"],
                1,
            ),
            QuizQuestion::new(
                "What does 'anhydrous' mean?",
                ["Contains water", "Without water", "Dissolved in water", "Frozen water"],
                1,
            ),
            QuizQuestion::new(
                "Cobalt chloride paper changes from blue to which color when water is present?",
                ["Green", "Yellow", "Pink", "Red"],
                2,
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
    fn tests_parse_from_ids_and_names() {
        assert_eq!("copper-sulfate".parse(), Ok(WaterTest::CopperSulfate));
        assert_eq!("Cobalt-Chloride".parse(), Ok(WaterTest::CobaltChloride));
        assert_eq!("cobalt chloride".parse(), Ok(WaterTest::CobaltChloride));
        assert_eq!(
            "Anhydrous Copper(II) Sulfate".parse(),
            Ok(WaterTest::CopperSulfate)
        );
        assert_eq!(
            "litmus".parse::<WaterTest>(),
            Err(UnknownWaterTest("litmus".to_string()))
        );
    }

    #[test]
    fn copper_sulfate_turns_blue() {
        let result = hydrate(WaterTest::CopperSulfate);
        assert_eq!(result.before, SampleColor::White);
        assert_eq!(result.after, SampleColor::Blue);
        assert!(result.conclusion.contains("hydrated"));
    }

    #[test]
    fn cobalt_paper_turns_pink() {
        let result = hydrate(WaterTest::CobaltChloride);
        assert_eq!(result.before, SampleColor::Blue);
        assert_eq!(result.after, SampleColor::Pink);
        assert!(result.conclusion.contains("hydrated"));
    }

    #[test]
    fn colour_changes_after_delay() {
        let mut bench = WaterTestBench::new();
        let start = fixed_now();
        bench
            .apply(WaterAction::Select(WaterTest::CopperSulfate), start)
            .unwrap();
        bench.apply(WaterAction::AddWater, start).unwrap();

        assert!(bench.tick(start + Duration::milliseconds(1999)).is_none());
        assert_eq!(bench.color_of(WaterTest::CopperSulfate), SampleColor::White);

        let done = bench
            .tick(start + Duration::milliseconds(HYDRATION_DELAY_MILLIS))
            .unwrap();
        assert!(done.trial_completed);
        assert_eq!(bench.color_of(WaterTest::CopperSulfate), SampleColor::Blue);
        assert!(bench.is_finished());
        assert!(!bench.has_tested_all());
    }

    #[test]
    fn both_tests_are_recorded_once() {
        let mut bench = WaterTestBench::new();
        let mut now = fixed_now();
        for test in [
            WaterTest::CopperSulfate,
            WaterTest::CobaltChloride,
            WaterTest::CobaltChloride,
        ] {
            bench.apply(WaterAction::Select(test), now).unwrap();
            bench.apply(WaterAction::AddWater, now).unwrap();
            now += Duration::seconds(3);
            bench.tick(now).unwrap();
        }
        assert_eq!(bench.results().len(), 2);
        assert!(bench.has_tested_all());
    }

    #[test]
    fn adding_water_needs_a_sample() {
        let mut bench = WaterTestBench::new();
        assert_eq!(
            bench.apply(WaterAction::AddWater, fixed_now()).unwrap_err(),
            ExperimentError::NoSampleSelected
        );
    }

    #[test]
    fn bench_is_busy_while_reacting() {
        let mut bench = WaterTestBench::new();
        bench
            .apply(WaterAction::Select(WaterTest::CobaltChloride), fixed_now())
            .unwrap();
        bench.apply(WaterAction::AddWater, fixed_now()).unwrap();
        assert_eq!(
            bench.apply(WaterAction::ResetSamples, fixed_now()).unwrap_err(),
            ExperimentError::Busy
        );
    }

    #[test]
    fn reset_samples_keeps_results() {
        let mut bench = WaterTestBench::new();
        let now = fixed_now();
        bench
            .apply(WaterAction::Select(WaterTest::CobaltChloride), now)
            .unwrap();
        bench.apply(WaterAction::AddWater, now).unwrap();
        bench.tick(now + Duration::seconds(2)).unwrap();
        bench.apply(WaterAction::ResetSamples, now).unwrap();
        assert_eq!(bench.color_of(WaterTest::CobaltChloride), SampleColor::Blue);
        assert_eq!(bench.results().len(), 1);
    }

    #[test]
    fn full_reset_cancels_pending_reaction() {
        let mut bench = WaterTestBench::new();
        bench
            .apply(WaterAction::Select(WaterTest::CopperSulfate), fixed_now())
            .unwrap();
        bench.apply(WaterAction::AddWater, fixed_now()).unwrap();
        bench.reset();
        assert!(bench.tick(fixed_now() + Duration::seconds(10)).is_none());
        assert!(bench.results().is_empty());
    }
}
