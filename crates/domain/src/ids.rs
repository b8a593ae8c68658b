use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Backend records are addressed by positive integer keys.
macro_rules! define_id {
    ($name:ident, $entity:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub fn new(value: i64) -> Self {
                Self(value)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| DomainError::invalid_id(format!("{} id '{}'", $entity, s)))
            }
        }
    };
}

// Character record and its rows
define_id!(CharacterId, "character");
define_id!(ClassEntryId, "class entry");
define_id!(EquipmentRowId, "equipment row");
define_id!(SpellRowId, "spell row");

// Compendium references
define_id!(RaceId, "race");
define_id!(SubraceId, "subrace");
define_id!(ClassId, "class");
define_id!(SubclassId, "subclass");
define_id!(BackgroundId, "background");
define_id!(ItemId, "item");
define_id!(SpellId, "spell");

/// Public-facing identifier of a character (shareable, opaque).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicId(String);

impl PublicId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_ids() {
        let id: CharacterId = " 17 ".parse().expect("valid id");
        assert_eq!(id.get(), 17);
        assert_eq!(id.to_string(), "17");
    }

    #[test]
    fn rejects_non_numeric_ids() {
        let err = "abc".parse::<RaceId>().expect_err("should fail");
        assert!(matches!(err, DomainError::InvalidId(_)));
        assert!(err.to_string().contains("race"));
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&ItemId::new(9)).expect("serialize");
        assert_eq!(json, "9");
    }
}
