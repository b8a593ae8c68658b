//! Choice type, subtype and source vocabulary.
//!
//! `ChoiceKind::classify` is the single mapping from the backend's
//! `{type, subtype}` pair to a closed set of kinds. Consumers match on
//! `ChoiceKind` and never compare raw type strings. In particular the
//! ability-score-improvement-or-feat decision arrives as
//! `type = ability_score, subtype = asi_or_feat`; there is no
//! `asi_or_feat` type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level choice type as sent by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChoiceType {
    Proficiency,
    Equipment,
    Spell,
    Language,
    Feature,
    AbilityScore,
    Subclass,
    /// Anything else; kept verbatim so it can still be displayed and resolved.
    Other(String),
}

impl ChoiceType {
    pub fn from_wire(value: &str) -> Self {
        match value.trim() {
            "proficiency" => ChoiceType::Proficiency,
            "equipment" => ChoiceType::Equipment,
            "spell" => ChoiceType::Spell,
            "language" => ChoiceType::Language,
            "feature" => ChoiceType::Feature,
            "ability_score" => ChoiceType::AbilityScore,
            "subclass" => ChoiceType::Subclass,
            other => ChoiceType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChoiceType::Proficiency => "proficiency",
            ChoiceType::Equipment => "equipment",
            ChoiceType::Spell => "spell",
            ChoiceType::Language => "language",
            ChoiceType::Feature => "feature",
            ChoiceType::AbilityScore => "ability_score",
            ChoiceType::Subclass => "subclass",
            ChoiceType::Other(value) => value,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, ChoiceType::Other(_))
    }
}

impl fmt::Display for ChoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a choice comes from.
///
/// Sources beyond the classic three are first-class: `subclass_feature`
/// and `feat` get their own groups, and unknown sources are preserved in
/// `Other` instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChoiceSource {
    Class,
    Race,
    Background,
    SubclassFeature,
    Feat,
    Other(String),
}

impl ChoiceSource {
    pub fn from_wire(value: &str) -> Self {
        match value.trim() {
            "class" => ChoiceSource::Class,
            "race" | "subrace" => ChoiceSource::Race,
            "background" => ChoiceSource::Background,
            "subclass_feature" | "subclass" => ChoiceSource::SubclassFeature,
            "feat" => ChoiceSource::Feat,
            other => ChoiceSource::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChoiceSource::Class => "class",
            ChoiceSource::Race => "race",
            ChoiceSource::Background => "background",
            ChoiceSource::SubclassFeature => "subclass_feature",
            ChoiceSource::Feat => "feat",
            ChoiceSource::Other(value) => value,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ChoiceSource::Class => "Class",
            ChoiceSource::Race => "Race",
            ChoiceSource::Background => "Background",
            ChoiceSource::SubclassFeature => "Subclass Feature",
            ChoiceSource::Feat => "Feat",
            ChoiceSource::Other(value) => value,
        }
    }
}

impl fmt::Display for ChoiceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed classification of a `{type, subtype}` pair.
///
/// Declaration order is the display order within a source group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceKind {
    Subclass,
    AsiOrFeat,
    AbilityScoreIncrease,
    Feat,
    FightingStyle,
    Expertise,
    OptionalFeature,
    Feature,
    Skill,
    Tool,
    Proficiency,
    Language,
    Equipment,
    Cantrip,
    Spell,
    Unrecognized,
}

impl ChoiceKind {
    /// The mapping table.
    pub fn classify(choice_type: &ChoiceType, subtype: Option<&str>) -> Self {
        let subtype = subtype.map(str::trim).filter(|s| !s.is_empty());
        match (choice_type, subtype) {
            (ChoiceType::AbilityScore, Some("asi_or_feat")) => ChoiceKind::AsiOrFeat,
            (ChoiceType::AbilityScore, _) => ChoiceKind::AbilityScoreIncrease,

            (ChoiceType::Feature, Some("feat")) => ChoiceKind::Feat,
            (ChoiceType::Feature, Some("fighting_style")) => ChoiceKind::FightingStyle,
            (ChoiceType::Feature, Some("expertise")) => ChoiceKind::Expertise,
            (ChoiceType::Feature, Some("optional_feature")) => ChoiceKind::OptionalFeature,
            (ChoiceType::Feature, _) => ChoiceKind::Feature,

            (ChoiceType::Proficiency, Some("skill")) => ChoiceKind::Skill,
            (ChoiceType::Proficiency, Some("tool")) => ChoiceKind::Tool,
            (ChoiceType::Proficiency, Some("expertise")) => ChoiceKind::Expertise,
            (ChoiceType::Proficiency, _) => ChoiceKind::Proficiency,

            (ChoiceType::Spell, Some("cantrip")) => ChoiceKind::Cantrip,
            (ChoiceType::Spell, _) => ChoiceKind::Spell,

            (ChoiceType::Language, _) => ChoiceKind::Language,
            (ChoiceType::Equipment, _) => ChoiceKind::Equipment,
            (ChoiceType::Subclass, _) => ChoiceKind::Subclass,
            (ChoiceType::Other(_), _) => ChoiceKind::Unrecognized,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChoiceKind::Subclass => "Subclass",
            ChoiceKind::AsiOrFeat => "Ability Score Improvement or Feat",
            ChoiceKind::AbilityScoreIncrease => "Ability Score Increase",
            ChoiceKind::Feat => "Feat",
            ChoiceKind::FightingStyle => "Fighting Style",
            ChoiceKind::Expertise => "Expertise",
            ChoiceKind::OptionalFeature => "Optional Feature",
            ChoiceKind::Feature => "Feature",
            ChoiceKind::Skill => "Skills",
            ChoiceKind::Tool => "Tools",
            ChoiceKind::Proficiency => "Proficiencies",
            ChoiceKind::Language => "Languages",
            ChoiceKind::Equipment => "Equipment",
            ChoiceKind::Cantrip => "Cantrips",
            ChoiceKind::Spell => "Spells",
            ChoiceKind::Unrecognized => "Other",
        }
    }

    pub fn is_spell(&self) -> bool {
        matches!(self, ChoiceKind::Cantrip | ChoiceKind::Spell)
    }

    pub fn is_proficiency(&self) -> bool {
        matches!(
            self,
            ChoiceKind::Skill | ChoiceKind::Tool | ChoiceKind::Proficiency
        )
    }
}
