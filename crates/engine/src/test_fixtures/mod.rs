//! Test fixtures and common test helpers.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_fixtures::{creation_wizard, demo_backend};
//!
//! #[tokio::test]
//! async fn walks_the_wizard() {
//!     let backend = demo_backend();
//!     let wizard = creation_wizard(&backend);
//!     // ... test logic
//! }
//! ```

use std::sync::Arc;

use charwright_domain::{
    Ability, AbilityScoreMethod, AbilityScores, BundleItem, CharacterId, CharacterSnapshot,
    ChoiceKey, ChoiceOption, ChoiceOptions, ChoiceSource, ChoiceType, ClassEntry, ClassEntryId,
    ClassId, ClassRef, EquipmentBundle, ItemId, LevelProgression, PendingChoice, RaceId, RaceRef,
    SubraceId, SubraceRef,
};

use crate::infrastructure::in_memory::InMemoryBackend;
use crate::infrastructure::retry::RetryConfig;
use crate::use_cases::{CreationWizard, LevelUpWizard};

// =============================================================================
// Backend and wizards
// =============================================================================

/// The demo backend behind an `Arc`, ready to hand to both ports.
pub fn demo_backend() -> Arc<InMemoryBackend> {
    Arc::new(InMemoryBackend::demo())
}

/// Single attempt so injected failures surface immediately.
pub fn no_retry() -> RetryConfig {
    RetryConfig::none()
}

pub fn creation_wizard(backend: &Arc<InMemoryBackend>) -> CreationWizard {
    CreationWizard::new(backend.clone(), backend.clone(), no_retry())
}

pub fn level_up_wizard(backend: &Arc<InMemoryBackend>) -> LevelUpWizard {
    LevelUpWizard::new(backend.clone(), no_retry())
}

async fn seeded(backend: &InMemoryBackend, id: i64, class: ClassId, level: u8) -> CharacterId {
    let mut snapshot = CharacterSnapshot::new(CharacterId::new(id), "Brienne");
    snapshot.level = level;
    snapshot.race_id = Some(RaceId::new(1));
    snapshot.abilities = Some(AbilityScores::from_array([15, 14, 13, 12, 10, 8]));
    snapshot.classes = vec![ClassEntry {
        id: Some(ClassEntryId::new(id + 1)),
        level,
        ..ClassEntry::primary(class)
    }];
    backend.insert_character(snapshot).await;
    CharacterId::new(id)
}

/// A level-`level` fighter stored directly in the backend.
pub async fn seeded_fighter(backend: &InMemoryBackend, id: i64, level: u8) -> CharacterId {
    seeded(backend, id, ClassId::new(5), level).await
}

/// A level-`level` wizard stored directly in the backend.
pub async fn seeded_wizard(backend: &InMemoryBackend, id: i64, level: u8) -> CharacterId {
    seeded(backend, id, ClassId::new(12), level).await
}

pub fn standard_array() -> (AbilityScores, AbilityScoreMethod) {
    (
        AbilityScores::from_array([15, 14, 13, 12, 10, 8]),
        AbilityScoreMethod::StandardArray,
    )
}

// =============================================================================
// Demo choice keys
// =============================================================================

pub mod keys {
    use super::*;

    pub fn fighter_skills() -> ChoiceKey {
        ChoiceKey::compose(&ChoiceType::Proficiency, &ChoiceSource::Class, 5, 1, "skills")
    }

    pub fn fighter_weapons() -> ChoiceKey {
        ChoiceKey::compose(&ChoiceType::Equipment, &ChoiceSource::Class, 5, 1, "weapons")
    }

    pub fn fighter_subclass() -> ChoiceKey {
        ChoiceKey::compose(&ChoiceType::Subclass, &ChoiceSource::Class, 5, 3, "subclass")
    }

    pub fn fighter_asi() -> ChoiceKey {
        ChoiceKey::compose(&ChoiceType::AbilityScore, &ChoiceSource::Class, 5, 4, "asi_or_feat")
    }

    pub fn wizard_cantrips() -> ChoiceKey {
        ChoiceKey::compose(&ChoiceType::Spell, &ChoiceSource::Class, 12, 1, "cantrips")
    }

    pub fn wizard_spells() -> ChoiceKey {
        ChoiceKey::compose(&ChoiceType::Spell, &ChoiceSource::Class, 12, 2, "spells")
    }

    pub fn acolyte_languages() -> ChoiceKey {
        ChoiceKey::compose(&ChoiceType::Language, &ChoiceSource::Background, 3, 1, "languages")
    }
}

// =============================================================================
// Reference data builders
// =============================================================================

pub mod races {
    use super::*;

    pub fn dwarf() -> RaceRef {
        RaceRef::new(RaceId::new(1), "Dwarf")
    }

    pub fn elf() -> RaceRef {
        RaceRef::new(RaceId::new(2), "Elf").with_subraces(vec![
            SubraceRef::new(SubraceId::new(21), "High Elf"),
            SubraceRef::new(SubraceId::new(22), "Wood Elf"),
        ])
    }
}

pub mod classes {
    use super::*;

    fn level(level: u8, cantrips: u8, spells: u8) -> LevelProgression {
        LevelProgression {
            level,
            cantrips_known: cantrips,
            spells_known: spells,
            spell_slots: Vec::new(),
        }
    }

    pub fn fighter() -> ClassRef {
        ClassRef {
            hit_die: 10,
            ..ClassRef::new(ClassId::new(5), "Fighter", "fighter")
                .with_progression(vec![level(1, 0, 0)])
        }
    }

    /// Declares a spellcasting ability but has nothing to cast at level 1.
    pub fn paladin() -> ClassRef {
        ClassRef::new(ClassId::new(7), "Paladin", "paladin")
            .with_spellcasting(Ability::Charisma)
            .with_progression(vec![level(1, 0, 0), level(2, 0, 2)])
    }

    pub fn wizard() -> ClassRef {
        ClassRef::new(ClassId::new(12), "Wizard", "wizard")
            .with_spellcasting(Ability::Intelligence)
            .with_progression(vec![level(1, 3, 6)])
    }
}

// =============================================================================
// Pending choice builders
// =============================================================================

pub mod choices {
    use super::*;

    pub fn skills(quantity: u32) -> PendingChoice {
        PendingChoice::new(keys::fighter_skills(), ChoiceType::Proficiency, ChoiceSource::Class, quantity)
            .with_subtype("skill")
            .with_options(ChoiceOptions::Inline(vec![
                ChoiceOption::new("athletics", "Athletics"),
                ChoiceOption::new("history", "History"),
                ChoiceOption::new("perception", "Perception"),
            ]))
    }

    pub fn asi_or_feat() -> PendingChoice {
        PendingChoice::new(keys::fighter_asi(), ChoiceType::AbilityScore, ChoiceSource::Class, 1)
            .with_subtype("asi_or_feat")
            .with_level(4)
            .with_options(ChoiceOptions::Inline(vec![
                ChoiceOption::new("asi", "Ability Score Improvement"),
                ChoiceOption::new("feat", "Feat"),
            ]))
    }

    /// Bundle `a` is a mace, bundle `b` a warhammer.
    pub fn weapons() -> PendingChoice {
        PendingChoice::new(keys::fighter_weapons(), ChoiceType::Equipment, ChoiceSource::Class, 1)
            .with_options(ChoiceOptions::Bundles(vec![
                EquipmentBundle::new(
                    "a",
                    "a mace",
                    vec![BundleItem::Catalog {
                        item_id: ItemId::new(101),
                        name: "Mace".into(),
                        quantity: 1,
                    }],
                ),
                EquipmentBundle::new(
                    "b",
                    "a warhammer",
                    vec![BundleItem::Catalog {
                        item_id: ItemId::new(102),
                        name: "Warhammer".into(),
                        quantity: 1,
                    }],
                ),
            ]))
    }
}
