//! Draft Character State.
//!
//! The working aggregate for one character under construction. Reference
//! data for the selected race, class and background is held alongside the
//! ids so the step sequencer can be evaluated without I/O.

use serde::{Deserialize, Serialize};

use crate::abilities::{AbilityScoreMethod, AbilityScores};
use crate::compendium::{BackgroundRef, ClassRef, RaceRef};
use crate::error::DomainError;
use crate::ids::{
    BackgroundId, CharacterId, ClassEntryId, ClassId, EquipmentRowId, ItemId, PublicId, RaceId,
    SpellId, SpellRowId, SubclassId, SubraceId,
};
use crate::names::CharacterName;

/// Loading/error status of the draft.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Lifecycle status of the remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterStatus {
    #[default]
    Draft,
    Active,
}

impl CharacterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CharacterStatus::Draft => "draft",
            CharacterStatus::Active => "active",
        }
    }

    /// Unknown statuses are treated as drafts.
    pub fn from_wire(value: &str) -> Self {
        match value.trim() {
            "active" => CharacterStatus::Active,
            _ => CharacterStatus::Draft,
        }
    }
}

/// One class entry of a character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    /// Row id, known once the entry is persisted.
    pub id: Option<ClassEntryId>,
    pub class_id: ClassId,
    pub subclass_id: Option<SubclassId>,
    pub level: u8,
    pub is_primary: bool,
    pub order: u32,
}

impl ClassEntry {
    pub fn primary(class_id: ClassId) -> Self {
        Self {
            id: None,
            class_id,
            subclass_id: None,
            level: 1,
            is_primary: true,
            order: 0,
        }
    }
}

/// What an equipment row holds: a catalog item or a free-text item that
/// is persisted by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EquipmentEntry {
    Catalog { item_id: ItemId, quantity: u32 },
    Custom { name: String, quantity: u32 },
}

impl EquipmentEntry {
    pub fn quantity(&self) -> u32 {
        match self {
            EquipmentEntry::Catalog { quantity, .. } | EquipmentEntry::Custom { quantity, .. } => {
                *quantity
            }
        }
    }
}

/// A persisted equipment row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentRow {
    pub id: EquipmentRowId,
    pub entry: EquipmentEntry,
    pub name: Option<String>,
}

/// A persisted spell row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellRow {
    pub id: SpellRowId,
    pub spell_id: SpellId,
    pub name: Option<String>,
}

/// Level-up in progress, as recorded on the character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLevelUp {
    pub class_slug: String,
    pub hp_choice_pending: bool,
    pub asi_pending: bool,
}

/// The remote character record as fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterSnapshot {
    pub id: CharacterId,
    pub public_id: Option<PublicId>,
    pub name: String,
    pub level: u8,
    pub status: CharacterStatus,
    pub race_id: Option<RaceId>,
    pub subrace_id: Option<SubraceId>,
    pub classes: Vec<ClassEntry>,
    pub background_id: Option<BackgroundId>,
    pub abilities: Option<AbilityScores>,
    pub ability_method: Option<AbilityScoreMethod>,
    pub pending_level_up: Option<PendingLevelUp>,
}

impl CharacterSnapshot {
    pub fn new(id: CharacterId, name: impl Into<String>) -> Self {
        Self {
            id,
            public_id: None,
            name: name.into(),
            level: 1,
            status: CharacterStatus::Draft,
            race_id: None,
            subrace_id: None,
            classes: Vec::new(),
            background_id: None,
            abilities: None,
            ability_method: None,
            pending_level_up: None,
        }
    }

    pub fn primary_class(&self) -> Option<&ClassEntry> {
        self.classes
            .iter()
            .find(|c| c.is_primary)
            .or_else(|| self.classes.first())
    }
}

/// Partial update of scalar attributes. `None` fields are left untouched;
/// `subrace_id: Some(None)` clears the subrace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharacterPatch {
    pub name: Option<String>,
    pub race_id: Option<RaceId>,
    pub subrace_id: Option<Option<SubraceId>>,
    pub background_id: Option<BackgroundId>,
    pub abilities: Option<AbilityScores>,
    pub ability_method: Option<AbilityScoreMethod>,
    pub status: Option<CharacterStatus>,
}

impl CharacterPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Derived statistics; every field is optional because the backend may
/// omit any of them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharacterStats {
    pub armor_class: Option<i32>,
    pub max_hp: Option<i32>,
    pub initiative: Option<i32>,
    pub speed: Option<i32>,
    pub proficiency_bonus: Option<i32>,
    pub passive_perception: Option<i32>,
}

/// Backend completeness check for a draft.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub is_complete: bool,
    pub missing: Vec<String>,
}

/// Reference data resolved for a loaded snapshot.
#[derive(Debug, Clone, Default)]
pub struct DraftReferences {
    pub race: Option<RaceRef>,
    pub class: Option<ClassRef>,
    pub background: Option<BackgroundRef>,
}

/// The working aggregate for one character under construction.
///
/// # Invariants
///
/// - while the total level is 1, exactly one class entry is primary
/// - `subrace` is `Some` only if the selected race declares subraces and
///   lists that subrace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftCharacter {
    pub id: Option<CharacterId>,
    pub public_id: Option<PublicId>,
    pub name: Option<CharacterName>,
    pub level: u8,
    pub race: Option<RaceRef>,
    pub subrace: Option<SubraceId>,
    pub classes: Vec<ClassEntry>,
    pub class: Option<ClassRef>,
    pub background: Option<BackgroundRef>,
    pub abilities: AbilityScores,
    pub ability_method: AbilityScoreMethod,
    pub abilities_confirmed: bool,
    pub equipment: Vec<EquipmentRow>,
    pub spells: Vec<SpellRow>,
    pub status: LoadStatus,
    pub finalized: bool,
}

impl Default for DraftCharacter {
    fn default() -> Self {
        Self {
            id: None,
            public_id: None,
            name: None,
            level: 1,
            race: None,
            subrace: None,
            classes: Vec::new(),
            class: None,
            background: None,
            abilities: AbilityScores::default(),
            ability_method: AbilityScoreMethod::default(),
            abilities_confirmed: false,
            equipment: Vec::new(),
            spells: Vec::new(),
            status: LoadStatus::Idle,
            finalized: false,
        }
    }
}

impl DraftCharacter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate a draft wholesale from a fetched record.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` when the character is above level 1
    /// (the creation editor only handles level-1 characters) or when the
    /// record's subrace does not belong to its race.
    pub fn from_snapshot(
        snapshot: CharacterSnapshot,
        refs: DraftReferences,
    ) -> Result<Self, DomainError> {
        let total_level = snapshot
            .classes
            .iter()
            .map(|c| u32::from(c.level))
            .sum::<u32>()
            .max(u32::from(snapshot.level));
        if total_level > 1 {
            return Err(DomainError::validation(format!(
                "Character is level {}; only level 1 characters can be edited here",
                total_level
            )));
        }

        let mut classes = snapshot.classes;
        normalize_primary(&mut classes);

        let draft = Self {
            id: Some(snapshot.id),
            public_id: snapshot.public_id,
            name: CharacterName::new(snapshot.name).ok(),
            level: 1,
            race: refs.race,
            subrace: snapshot.subrace_id,
            classes,
            class: refs.class,
            background: refs.background,
            abilities_confirmed: snapshot.abilities.is_some(),
            abilities: snapshot.abilities.unwrap_or_default(),
            ability_method: snapshot.ability_method.unwrap_or_default(),
            equipment: Vec::new(),
            spells: Vec::new(),
            status: LoadStatus::Ready,
            finalized: snapshot.status == CharacterStatus::Active,
        };
        draft.check_invariants()?;
        Ok(draft)
    }

    /// Back to a fresh draft. Only local state is discarded.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn set_name(&mut self, name: CharacterName) {
        self.name = Some(name);
    }

    /// Select a race. Returns `true` if the race changed, in which case any
    /// subrace selection is dropped.
    pub fn select_race(&mut self, race: RaceRef) -> bool {
        let changed = self.race.as_ref().map(|r| r.id) != Some(race.id);
        if changed {
            self.subrace = None;
        }
        self.race = Some(race);
        changed
    }

    /// # Errors
    ///
    /// Returns `DomainError::Validation` when no race is selected or the
    /// race does not list `subrace_id`.
    pub fn select_subrace(&mut self, subrace_id: SubraceId) -> Result<(), DomainError> {
        let race = self
            .race
            .as_ref()
            .ok_or_else(|| DomainError::validation("Select a race before a subrace"))?;
        if race.subrace(subrace_id).is_none() {
            return Err(DomainError::validation(format!(
                "Subrace {} is not available for {}",
                subrace_id, race.name
            )));
        }
        self.subrace = Some(subrace_id);
        Ok(())
    }

    /// Select the single level-1 class. Returns `true` if the class changed.
    pub fn select_class(&mut self, class: ClassRef) -> bool {
        let changed = self.class.as_ref().map(|c| c.id) != Some(class.id);
        if changed || self.classes.len() != 1 {
            self.classes = vec![ClassEntry::primary(class.id)];
        }
        self.class = Some(class);
        changed
    }

    pub fn select_background(&mut self, background: BackgroundRef) {
        self.background = Some(background);
    }

    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the scores break the method's
    /// rules.
    pub fn set_abilities(
        &mut self,
        scores: AbilityScores,
        method: AbilityScoreMethod,
    ) -> Result<(), DomainError> {
        scores.validate(method)?;
        self.abilities = scores;
        self.ability_method = method;
        self.abilities_confirmed = true;
        Ok(())
    }

    pub fn primary_class(&self) -> Option<&ClassEntry> {
        self.classes.iter().find(|c| c.is_primary)
    }

    pub fn total_level(&self) -> u8 {
        let from_classes: u32 = self.classes.iter().map(|c| u32::from(c.level)).sum();
        u8::try_from(from_classes)
            .unwrap_or(u8::MAX)
            .max(self.level)
    }

    /// Whether the selected race offers a subrace step.
    pub fn needs_subrace(&self) -> bool {
        self.race.as_ref().is_some_and(RaceRef::has_subraces)
    }

    /// Whether the selected class grants spells at the draft's level.
    pub fn is_caster(&self) -> bool {
        self.class
            .as_ref()
            .is_some_and(|c| c.is_caster_at(self.total_level()))
    }

    pub fn grants_bonus_feat(&self) -> bool {
        self.race.as_ref().is_some_and(RaceRef::grants_bonus_feat)
    }

    /// # Errors
    ///
    /// Returns `DomainError::Constraint` naming the first broken invariant.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        if self.total_level() == 1 && !self.classes.is_empty() {
            let primaries = self.classes.iter().filter(|c| c.is_primary).count();
            if primaries != 1 {
                return Err(DomainError::constraint(format!(
                    "A level 1 character needs exactly one primary class, found {}",
                    primaries
                )));
            }
        }
        if let Some(subrace) = self.subrace {
            let listed = self
                .race
                .as_ref()
                .is_some_and(|r| r.subrace(subrace).is_some());
            if !listed {
                return Err(DomainError::constraint(format!(
                    "Subrace {} does not belong to the selected race",
                    subrace
                )));
            }
        }
        Ok(())
    }
}

/// Ensure exactly one entry is primary; the lowest `order` wins when the
/// record has none or several.
fn normalize_primary(classes: &mut [ClassEntry]) {
    let primaries = classes.iter().filter(|c| c.is_primary).count();
    if primaries == 1 || classes.is_empty() {
        return;
    }
    let first = classes
        .iter()
        .enumerate()
        .min_by_key(|(_, c)| (!c.is_primary, c.order))
        .map(|(index, _)| index)
        .unwrap_or(0);
    for (index, class) in classes.iter_mut().enumerate() {
        class.is_primary = index == first;
    }
}
