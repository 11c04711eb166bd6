use std::fmt;

use super::{LabDefinition, flame, refraction, titration, water};
use crate::error::Error;
use crate::model::LabId;

/// The labs shipped with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabKind {
    Titration,
    FlameTest,
    Refraction,
    WaterTest,
}

impl LabKind {
    pub const ALL: [LabKind; 4] = [
        LabKind::Titration,
        LabKind::FlameTest,
        LabKind::Refraction,
        LabKind::WaterTest,
    ];

    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            LabKind::Titration => titration::LAB_SLUG,
            LabKind::FlameTest => flame::LAB_SLUG,
            LabKind::Refraction => refraction::LAB_SLUG,
            LabKind::WaterTest => water::LAB_SLUG,
        }
    }

    #[must_use]
    pub fn id(self) -> LabId {
        LabId::from_catalog(self.slug())
    }

    #[must_use]
    pub fn definition(self) -> LabDefinition {
        match self {
            LabKind::Titration => titration::definition(),
            LabKind::FlameTest => flame::definition(),
            LabKind::Refraction => refraction::definition(),
            LabKind::WaterTest => water::definition(),
        }
    }

    /// Look up a lab by slug.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidLabId` for malformed slugs and
    /// `Error::UnknownLab` for well-formed slugs not in the catalog.
    pub fn find(slug: &str) -> Result<Self, Error> {
        let id = LabId::new(slug)?;
        Self::ALL
            .into_iter()
            .find(|kind| kind.slug() == id.as_str())
            .ok_or(Error::UnknownLab(id))
    }
}

impl fmt::Display for LabKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Definitions for every lab, in catalog order.
#[must_use]
pub fn definitions() -> Vec<LabDefinition> {
    LabKind::ALL.into_iter().map(LabKind::definition).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Quiz;
    use std::collections::HashSet;

    #[test]
    fn catalog_slugs_are_valid_ids() {
        for kind in LabKind::ALL {
            assert_eq!(LabId::new(kind.slug()).unwrap(), kind.id());
            assert_eq!(kind.definition().id, kind.id());
        }
    }

    #[test]
    fn catalog_quizzes_have_valid_answer_keys() {
        for def in definitions() {
            assert!(Quiz::new(def.questions.clone()).is_ok(), "{}", def.id);
        }
    }

    #[test]
    fn supply_ids_are_unique_per_lab() {
        for def in definitions() {
            let ids: HashSet<_> = def.supplies.iter().map(|s| s.id.clone()).collect();
            assert_eq!(ids.len(), def.supplies.len(), "{}", def.id);
        }
    }

    #[test]
    fn find_resolves_slugs() {
        assert_eq!(LabKind::find("flame-test").unwrap(), LabKind::FlameTest);
        assert_eq!(LabKind::find(" refraction ").unwrap(), LabKind::Refraction);
        assert!(matches!(
            LabKind::find("rusting"),
            Err(Error::UnknownLab(_))
        ));
        assert!(matches!(
            LabKind::find("Flame Test"),
            Err(Error::InvalidLabId(_))
        ));
    }

    #[test]
    fn setup_step_only_where_declared() {
        assert!(!LabKind::Titration.definition().has_setup);
        assert!(!LabKind::FlameTest.definition().has_setup);
        assert!(LabKind::Refraction.definition().has_setup);
        assert!(LabKind::WaterTest.definition().has_setup);
    }
}
