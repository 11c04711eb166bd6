use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised when a lab slug fails validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LabIdError {
    #[error("lab id cannot be empty")]
    Empty,
    #[error("lab id {raw:?} contains invalid character {ch:?}")]
    InvalidChar { raw: String, ch: char },
    #[error("lab id {0:?} cannot start or end with '-'")]
    DanglingDash(String),
}

/// Stable slug identifying a lab, e.g. `flame-test`.
///
/// Slugs are lowercase ASCII letters, digits and single dashes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LabId(String);

impl LabId {
    /// Creates a validated `LabId`.
    ///
    /// # Errors
    ///
    /// Returns `LabIdError` if the slug is empty, has characters outside
    /// `[a-z0-9-]`, or starts/ends with a dash.
    pub fn new(raw: impl Into<String>) -> Result<Self, LabIdError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LabIdError::Empty);
        }
        if let Some(ch) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(LabIdError::InvalidChar {
                raw: trimmed.to_string(),
                ch,
            });
        }
        if trimmed.starts_with('-') || trimmed.ends_with('-') {
            return Err(LabIdError::DanglingDash(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Catalog slugs are compile-time constants covered by the catalog tests.
    pub(crate) fn from_catalog(slug: &'static str) -> Self {
        Self(slug.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LabId {
    type Error = LabIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LabId> for String {
    fn from(value: LabId) -> Self {
        value.0
    }
}

impl FromStr for LabId {
    type Err = LabIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identifier of a supply item a learner collects before an experiment.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SupplyId(String);

impl SupplyId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SupplyId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of a single in-memory lab session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LabSessionId(Uuid);

impl LabSessionId {
    /// Creates a fresh random session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(&self) -> Uuid {
        self.0
    }
}

// ─── Debug / Display ───────────────────────────────────────────────────────────

impl fmt::Debug for LabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LabId({})", self.0)
    }
}

impl fmt::Debug for SupplyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SupplyId({})", self.0)
    }
}

impl fmt::Debug for LabSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LabSessionId({})", self.0)
    }
}

impl fmt::Display for LabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SupplyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for LabSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_id_accepts_kebab_case() {
        let id: LabId = "acid-base-neutralization".parse().unwrap();
        assert_eq!(id.as_str(), "acid-base-neutralization");
        assert_eq!(id.to_string(), "acid-base-neutralization");
    }

    #[test]
    fn lab_id_trims_whitespace() {
        let id = LabId::new("  flame-test ").unwrap();
        assert_eq!(id.as_str(), "flame-test");
    }

    #[test]
    fn lab_id_rejects_empty() {
        assert_eq!(LabId::new("   ").unwrap_err(), LabIdError::Empty);
    }

    #[test]
    fn lab_id_rejects_uppercase_and_spaces() {
        let err = LabId::new("Flame Test").unwrap_err();
        assert!(matches!(err, LabIdError::InvalidChar { ch: 'F', .. }));
    }

    #[test]
    fn lab_id_rejects_dangling_dash() {
        assert!(matches!(
            LabId::new("-refraction"),
            Err(LabIdError::DanglingDash(_))
        ));
    }

    #[test]
    fn lab_id_deserialization_validates() {
        let ok: LabId = serde_json::from_str("\"water-test\"").unwrap();
        assert_eq!(ok.as_str(), "water-test");
        assert!(serde_json::from_str::<LabId>("\"Water Test\"").is_err());
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(LabSessionId::generate(), LabSessionId::generate());
    }
}
