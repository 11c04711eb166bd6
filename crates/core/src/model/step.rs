use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown lab step: {0}")]
pub struct StepParseError(String);

/// Steps of a guided lab, in canonical order.
///
/// The derived ordering follows declaration order, so `a < b` means `a` comes
/// earlier in the lab. Sessions only ever move forward except on reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabStep {
    Intro,
    CollectSupplies,
    Setup,
    Experiment,
    Results,
    Quiz,
    Complete,
}

impl LabStep {
    pub const ALL: [LabStep; 7] = [
        LabStep::Intro,
        LabStep::CollectSupplies,
        LabStep::Setup,
        LabStep::Experiment,
        LabStep::Results,
        LabStep::Quiz,
        LabStep::Complete,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LabStep::Intro => "intro",
            LabStep::CollectSupplies => "collect-supplies",
            LabStep::Setup => "setup",
            LabStep::Experiment => "experiment",
            LabStep::Results => "results",
            LabStep::Quiz => "quiz",
            LabStep::Complete => "complete",
        }
    }

    /// The step that follows this one, skipping `Setup` for labs without it.
    #[must_use]
    pub fn next(self, has_setup: bool) -> Option<LabStep> {
        match self {
            LabStep::Intro => Some(LabStep::CollectSupplies),
            LabStep::CollectSupplies if has_setup => Some(LabStep::Setup),
            LabStep::CollectSupplies | LabStep::Setup => Some(LabStep::Experiment),
            LabStep::Experiment => Some(LabStep::Results),
            LabStep::Results => Some(LabStep::Quiz),
            LabStep::Quiz => Some(LabStep::Complete),
            LabStep::Complete => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == LabStep::Complete
    }
}

impl fmt::Display for LabStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabStep {
    type Err = StepParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LabStep::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| StepParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order_matches_declaration() {
        let mut sorted = LabStep::ALL;
        sorted.sort();
        assert_eq!(sorted, LabStep::ALL);
    }

    #[test]
    fn next_is_always_later() {
        for has_setup in [true, false] {
            for step in LabStep::ALL {
                if let Some(next) = step.next(has_setup) {
                    assert!(next > step, "{step} -> {next}");
                }
            }
        }
    }

    #[test]
    fn setup_is_skipped_when_absent() {
        assert_eq!(
            LabStep::CollectSupplies.next(false),
            Some(LabStep::Experiment)
        );
        assert_eq!(LabStep::CollectSupplies.next(true), Some(LabStep::Setup));
        assert_eq!(LabStep::Complete.next(true), None);
    }

    #[test]
    fn parses_kebab_case_names() {
        assert_eq!(
            "collect-supplies".parse::<LabStep>().unwrap(),
            LabStep::CollectSupplies
        );
        assert!("review".parse::<LabStep>().is_err());
    }
}
