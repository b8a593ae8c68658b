//! Reference data the wizard needs about the selected race, class and
//! background.
//!
//! These are read-only summaries fetched from the compendium; the wizard
//! only inspects the parts that influence step sequencing and choice
//! grouping.

use crate::abilities::Ability;
use crate::choice::{ChoiceKey, ChoiceOption, ChoiceSource, ChoiceType, PendingChoice};
use crate::ids::{BackgroundId, ClassId, RaceId, SubraceId};

/// Modifier category that grants a bonus feat.
const BONUS_FEAT_CATEGORY: &str = "bonus feat";

/// A rules modifier attached to a race (or subrace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modifier {
    pub category: String,
    pub subcategory: Option<String>,
    pub value: Option<i32>,
}

impl Modifier {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            subcategory: None,
            value: None,
        }
    }

    /// Matches "bonus feat", "Bonus Feat", "bonus_feat" and "bonus-feat".
    pub fn grants_bonus_feat(&self) -> bool {
        normalize_category(&self.category) == BONUS_FEAT_CATEGORY
    }
}

fn normalize_category(category: &str) -> String {
    category
        .trim()
        .chars()
        .map(|c| match c {
            '_' | '-' => ' ',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// A group of proficiency options declared by reference data
/// ("choose two skills from ...").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProficiencyGroup {
    pub group: String,
    pub choose: u32,
    pub options: Vec<ChoiceOption>,
}

impl ProficiencyGroup {
    pub fn new(group: impl Into<String>, choose: u32, options: Vec<ChoiceOption>) -> Self {
        Self {
            group: group.into(),
            choose,
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubraceRef {
    pub id: SubraceId,
    pub name: String,
    pub modifiers: Vec<Modifier>,
}

impl SubraceRef {
    pub fn new(id: SubraceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            modifiers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceRef {
    pub id: RaceId,
    pub name: String,
    pub subraces: Vec<SubraceRef>,
    pub modifiers: Vec<Modifier>,
    pub proficiency_groups: Vec<ProficiencyGroup>,
}

impl RaceRef {
    pub fn new(id: RaceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            subraces: Vec::new(),
            modifiers: Vec::new(),
            proficiency_groups: Vec::new(),
        }
    }

    pub fn with_subraces(mut self, subraces: Vec<SubraceRef>) -> Self {
        self.subraces = subraces;
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_proficiency_group(mut self, group: ProficiencyGroup) -> Self {
        self.proficiency_groups.push(group);
        self
    }

    pub fn has_subraces(&self) -> bool {
        !self.subraces.is_empty()
    }

    pub fn subrace(&self, id: SubraceId) -> Option<&SubraceRef> {
        self.subraces.iter().find(|s| s.id == id)
    }

    /// Detected through modifiers, never through the race's name.
    pub fn grants_bonus_feat(&self) -> bool {
        self.modifiers.iter().any(Modifier::grants_bonus_feat)
    }
}

/// One row of a class's level progression table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LevelProgression {
    pub level: u8,
    pub cantrips_known: u8,
    pub spells_known: u8,
    /// Slots per spell level, index 0 = 1st-level slots.
    pub spell_slots: Vec<u8>,
}

impl LevelProgression {
    pub fn grants_spells(&self) -> bool {
        self.cantrips_known > 0 || self.spells_known > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRef {
    pub id: ClassId,
    pub name: String,
    pub slug: String,
    pub hit_die: u8,
    pub spellcasting_ability: Option<Ability>,
    pub progression: Vec<LevelProgression>,
    pub proficiency_groups: Vec<ProficiencyGroup>,
    pub subclass_level: Option<u8>,
}

impl ClassRef {
    pub fn new(id: ClassId, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            slug: slug.into(),
            hit_die: 8,
            spellcasting_ability: None,
            progression: Vec::new(),
            proficiency_groups: Vec::new(),
            subclass_level: None,
        }
    }

    pub fn with_spellcasting(mut self, ability: Ability) -> Self {
        self.spellcasting_ability = Some(ability);
        self
    }

    pub fn with_progression(mut self, progression: Vec<LevelProgression>) -> Self {
        self.progression = progression;
        self
    }

    pub fn with_proficiency_group(mut self, group: ProficiencyGroup) -> Self {
        self.proficiency_groups.push(group);
        self
    }

    pub fn progression_at(&self, level: u8) -> Option<&LevelProgression> {
        self.progression.iter().find(|p| p.level == level)
    }

    /// A class only counts as a caster at `level` when its progression
    /// grants at least one cantrip or spell there. A spellcasting ability
    /// with an all-zero row (half casters at level 1) does not qualify.
    pub fn is_caster_at(&self, level: u8) -> bool {
        self.spellcasting_ability.is_some()
            && self
                .progression_at(level)
                .is_some_and(LevelProgression::grants_spells)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundRef {
    pub id: BackgroundId,
    pub name: String,
    pub proficiency_groups: Vec<ProficiencyGroup>,
}

impl BackgroundRef {
    pub fn new(id: BackgroundId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            proficiency_groups: Vec::new(),
        }
    }

    pub fn with_proficiency_group(mut self, group: ProficiencyGroup) -> Self {
        self.proficiency_groups.push(group);
        self
    }
}

/// Express a reference-data proficiency group as an already-answered
/// pending choice, so it can be revisited through the same evaluator.
pub fn answered_group_choice(
    source: ChoiceSource,
    source_id: i64,
    group: &ProficiencyGroup,
) -> PendingChoice {
    let key = ChoiceKey::compose(&ChoiceType::Proficiency, &source, source_id, 1, &group.group);
    PendingChoice::new(key, ChoiceType::Proficiency, source, group.choose)
        .with_options(crate::choice::ChoiceOptions::Inline(group.options.clone()))
        .with_remaining(0)
}
