//! Composite choice identifiers.
//!
//! The backend addresses every pending choice with a key of the form
//! `type|source|source-identifier|level-granted|discriminator`. The same key
//! is used for display grouping and as the path segment of the resolution
//! endpoint, so it is kept verbatim and only parsed on demand.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::kind::{ChoiceSource, ChoiceType};

const SEPARATOR: char = '|';

/// Addressable key of one pending choice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChoiceKey(String);

/// Borrowed view of the five key segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChoiceKeyParts<'a> {
    pub choice_type: &'a str,
    pub source: &'a str,
    pub source_id: &'a str,
    pub level_granted: Option<u8>,
    pub discriminator: &'a str,
}

impl ChoiceKey {
    /// Wrap a key exactly as the backend sent it.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build a key from its segments.
    pub fn compose(
        choice_type: &ChoiceType,
        source: &ChoiceSource,
        source_id: impl fmt::Display,
        level_granted: u8,
        discriminator: &str,
    ) -> Self {
        Self(format!(
            "{}{sep}{}{sep}{}{sep}{}{sep}{}",
            choice_type.as_str(),
            source.as_str(),
            source_id,
            level_granted,
            discriminator,
            sep = SEPARATOR
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into segments. `None` when the key does not have five segments;
    /// such keys are still usable as opaque identifiers.
    pub fn parts(&self) -> Option<ChoiceKeyParts<'_>> {
        let mut segments = self.0.splitn(5, SEPARATOR);
        let choice_type = segments.next()?;
        let source = segments.next()?;
        let source_id = segments.next()?;
        let level = segments.next()?;
        let discriminator = segments.next()?;
        Some(ChoiceKeyParts {
            choice_type,
            source,
            source_id,
            level_granted: level.parse().ok(),
            discriminator,
        })
    }

    /// The choice-group name submitted alongside a resolution. Falls back to
    /// the whole key for opaque keys.
    pub fn group(&self) -> &str {
        self.parts()
            .map(|p| p.discriminator)
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for ChoiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChoiceKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// `source:group` composite used to address proficiency groups that are
/// declared by reference data rather than by the pending list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceGroupKey {
    pub source: ChoiceSource,
    pub group: String,
}

impl SourceGroupKey {
    pub fn new(source: ChoiceSource, group: impl Into<String>) -> Self {
        Self {
            source,
            group: group.into(),
        }
    }
}

impl fmt::Display for SourceGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source.as_str(), self.group)
    }
}
