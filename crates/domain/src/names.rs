//! Validated character name.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

const MAX_NAME_LENGTH: usize = 100;

/// A validated character name (non-empty, <=100 chars, trimmed)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CharacterName(String);

impl CharacterName {
    /// Create a new validated character name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the trimmed name is empty or
    /// longer than 100 characters.
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("Character name cannot be empty"));
        }
        if trimmed.chars().count() > MAX_NAME_LENGTH {
            return Err(DomainError::validation(format!(
                "Character name cannot exceed {} characters",
                MAX_NAME_LENGTH
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CharacterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CharacterName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CharacterName> for String {
    fn from(name: CharacterName) -> String {
        name.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_whitespace() {
        let name = CharacterName::new("  Thorin  ").unwrap();
        assert_eq!(name.as_str(), "Thorin");
    }

    #[test]
    fn rejects_empty_and_blank() {
        assert!(CharacterName::new("").is_err());
        assert!(CharacterName::new("   ").is_err());
    }

    #[test]
    fn rejects_too_long() {
        let long = "a".repeat(MAX_NAME_LENGTH + 1);
        assert!(matches!(
            CharacterName::new(long),
            Err(DomainError::Validation(_))
        ));
        assert!(CharacterName::new("a".repeat(MAX_NAME_LENGTH)).is_ok());
    }

    #[test]
    fn serde_validates() {
        let ok: CharacterName = serde_json::from_str("\"Thorin\"").unwrap();
        assert_eq!(ok.as_str(), "Thorin");
        assert!(serde_json::from_str::<CharacterName>("\"  \"").is_err());
    }
}
