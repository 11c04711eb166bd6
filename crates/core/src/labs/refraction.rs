//! Refraction of light at an air boundary, modelled with Snell's law.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use super::{
    CELEBRATION_DELAY_SECS, Experiment, ExperimentError, LabDefinition, Outcome,
    RESULTS_DELAY_SECS, Subject,
};
use crate::model::{LabId, QuizQuestion, ScorePolicy, SupplyItem};

pub const LAB_SLUG: &str = "refraction";

pub const AIR_INDEX: f64 = 1.0;
pub const DEFAULT_INCIDENT_DEG: f64 = 30.0;
pub const MAX_INCIDENT_DEG: f64 = 89.0;
pub const MEASUREMENTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Medium {
    #[default]
    Glass,
    Water,
}

impl Medium {
    #[must_use]
    pub fn index(self) -> f64 {
        match self {
            Medium::Glass => 1.5,
            Medium::Water => 1.33,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Medium::Glass => "glass",
            Medium::Water => "water",
        }
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a ray meeting a boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Refraction {
    Refracted { angle_deg: f64 },
    /// No refracted ray exists: sin θ₂ would exceed 1.
    TotalInternalReflection,
}

impl Refraction {
    /// Refracted angle, or 0 when the ray is totally reflected.
    #[must_use]
    pub fn angle_or_zero(self) -> f64 {
        match self {
            Refraction::Refracted { angle_deg } => angle_deg,
            Refraction::TotalInternalReflection => 0.0,
        }
    }
}

/// Snell's law: n₁ sin θ₁ = n₂ sin θ₂.
#[must_use]
pub fn refract(incident_deg: f64, n1: f64, n2: f64) -> Refraction {
    let sin_refracted = n1 * incident_deg.to_radians().sin() / n2;
    if !sin_refracted.is_finite() || sin_refracted.abs() > 1.0 {
        return Refraction::TotalInternalReflection;
    }
    Refraction::Refracted {
        angle_deg: sin_refracted.asin().to_degrees(),
    }
}

/// Clamp a learner-supplied angle into the usable range; NaN becomes 0.
#[must_use]
pub fn clamp_incident(angle_deg: f64) -> f64 {
    if angle_deg.is_nan() {
        return 0.0;
    }
    angle_deg.clamp(0.0, MAX_INCIDENT_DEG)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefractionMeasurement {
    pub medium: Medium,
    pub incident_deg: f64,
    pub refracted: Refraction,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RefractionAction {
    SetIncidentAngle(f64),
    SetMedium(Medium),
    Measure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefractionObservation {
    Aimed { incident_deg: f64, refracted: Refraction },
    Measured(RefractionMeasurement),
}

/// Ray box aimed at a block of glass or a tank of water.
#[derive(Debug, Clone, PartialEq)]
pub struct RefractionBench {
    incident_deg: f64,
    medium: Medium,
    measurements: Vec<RefractionMeasurement>,
}

impl Default for RefractionBench {
    fn default() -> Self {
        Self {
            incident_deg: DEFAULT_INCIDENT_DEG,
            medium: Medium::default(),
            measurements: Vec::new(),
        }
    }
}

impl RefractionBench {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn incident_deg(&self) -> f64 {
        self.incident_deg
    }

    #[must_use]
    pub fn medium(&self) -> Medium {
        self.medium
    }

    /// Live refracted ray for the current angle and medium.
    #[must_use]
    pub fn current(&self) -> Refraction {
        refract(self.incident_deg, AIR_INDEX, self.medium.index())
    }

    #[must_use]
    pub fn measurements(&self) -> &[RefractionMeasurement] {
        &self.measurements
    }

    fn aimed(&self) -> RefractionObservation {
        RefractionObservation::Aimed {
            incident_deg: self.incident_deg,
            refracted: self.current(),
        }
    }
}

impl Experiment for RefractionBench {
    type Action = RefractionAction;
    type Observation = RefractionObservation;

    fn required_trials(&self) -> usize {
        MEASUREMENTS
    }

    fn completed_trials(&self) -> usize {
        self.measurements.len()
    }

    fn apply(
        &mut self,
        action: RefractionAction,
        _now: DateTime<Utc>,
    ) -> Result<Outcome<RefractionObservation>, ExperimentError> {
        match action {
            RefractionAction::SetIncidentAngle(angle) => {
                self.incident_deg = clamp_incident(angle);
                Ok(Outcome::quiet(self.aimed()))
            }
            RefractionAction::SetMedium(medium) => {
                self.medium = medium;
                Ok(Outcome::quiet(self.aimed()))
            }
            RefractionAction::Measure => {
                let measurement = RefractionMeasurement {
                    medium: self.medium,
                    incident_deg: self.incident_deg,
                    refracted: self.current(),
                };
                if self.measurements.len() >= MEASUREMENTS {
                    // The table holds the latest readings only.
                    self.measurements.remove(0);
                    self.measurements.push(measurement);
                    return Ok(Outcome::narrated(
                        RefractionObservation::Measured(measurement),
                        format!(
                            "Measured {:.1}° at {:.1}°. The oldest reading was replaced.",
                            measurement.refracted.angle_or_zero(),
                            measurement.incident_deg
                        ),
                    ));
                }
                self.measurements.push(measurement);
                let narration = match self.measurements.len() {
                    1 => format!(
                        "First measurement recorded! Light bent from {:.1}° to {:.1}°. \
                         Try a different angle or medium!",
                        measurement.incident_deg,
                        measurement.refracted.angle_or_zero()
                    ),
                    2 => "Great! Notice how the angle changes. Take one more measurement to see the pattern!"
                        .to_string(),
                    _ => "Excellent! Three measurements complete. You've verified Snell's Law: \
                          light bends toward the normal when entering a denser medium."
                        .to_string(),
                };
                Ok(
                    Outcome::narrated(RefractionObservation::Measured(measurement), narration)
                        .completing_trial(),
                )
            }
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
        title: "Refraction of Light".to_string(),
        subject: Subject::Physics,
        description: "Observe how light bends when passing through different media.".to_string(),
        objective: "Explore how light changes direction at boundaries and calculate refractive indices."
            .to_string(),
        intro_message: "Welcome to the Refraction Lab! Light travels at different speeds in different \
                        materials, and that makes it bend. Let's measure how much."
            .to_string(),
        supplies: vec![
            SupplyItem::new("light-source", "Light Source", "Produces a narrow ray of light"),
            SupplyItem::new("glass-block", "Glass Block", "Rectangular block with n = 1.5"),
            SupplyItem::new("water-tank", "Water Tank", "Clear tank of water with n = 1.33"),
            SupplyItem::new("protractor", "Protractor", "Measures angles from the normal"),
        ],
        has_setup: true,
        questions: vec![
            QuizQuestion::new(
                "When light enters a denser medium, it:",
                [
                    "Bends toward the normal",
                    "Bends away from the normal",
                    "Continues straight without bending",
                ],
                0,
            ),
            QuizQuestion::new(
                "In refraction, light bends:",
                [
                    "Toward the normal when entering a denser medium",
                    "The same amount regardless of the medium",
                    "Away from the normal when entering a denser medium",
                ],
                0,
            ),
            QuizQuestion::new(
                "Which law describes the relationship between incident and refracted angles?",
                ["Snell's Law", "Newton's Law", "Hooke's Law"],
                0,
            ),
        ],
        results_delay: Duration::seconds(RESULTS_DELAY_SECS),
        celebration_delay: Duration::seconds(CELEBRATION_DELAY_SECS),
        score_policy: ScorePolicy::Flat,
    }
}
