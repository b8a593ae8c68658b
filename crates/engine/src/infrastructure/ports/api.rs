//! Rules backend port traits.

use async_trait::async_trait;
use charwright_domain::{
    BackgroundId, BackgroundRef, CharacterId, CharacterPatch, CharacterSnapshot, CharacterStats,
    ChoiceKey, ClassEntry, ClassEntryId, ClassId, ClassRef, EquipmentEntry, EquipmentRow,
    EquipmentRowId, HpMethod, LevelUpResult, OptionId, PendingChoice, RaceId, RaceRef, SpellId,
    SpellRow, SpellRowId, ValidationReport,
};

use super::error::ApiError;

/// Body of a choice resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceResolution {
    pub source: String,
    pub choice_group: String,
    pub selected: Vec<OptionId>,
}

impl ChoiceResolution {
    pub fn for_choice(choice: &PendingChoice, selected: Vec<OptionId>) -> Self {
        Self {
            source: choice.source.as_str().to_string(),
            choice_group: choice.group().to_string(),
            selected,
        }
    }
}

/// The character record and its sub-resources.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CharacterApi: Send + Sync {
    async fn create_character(&self, name: &str) -> Result<CharacterSnapshot, ApiError>;

    async fn get_character(&self, id: CharacterId) -> Result<CharacterSnapshot, ApiError>;

    async fn update_character(&self, id: CharacterId, patch: &CharacterPatch) -> Result<(), ApiError>;

    /// Remove the remote draft. Never called by a wizard reset.
    async fn delete_character(&self, id: CharacterId) -> Result<(), ApiError>;

    async fn list_classes(&self, id: CharacterId) -> Result<Vec<ClassEntry>, ApiError>;

    async fn add_class(
        &self,
        id: CharacterId,
        class_id: ClassId,
        level: u8,
        is_primary: bool,
    ) -> Result<ClassEntry, ApiError>;

    async fn remove_class(&self, id: CharacterId, entry_id: ClassEntryId) -> Result<(), ApiError>;

    async fn pending_choices(&self, id: CharacterId) -> Result<Vec<PendingChoice>, ApiError>;

    async fn resolve_choice(
        &self,
        id: CharacterId,
        choice: &ChoiceKey,
        resolution: &ChoiceResolution,
    ) -> Result<(), ApiError>;

    async fn list_equipment(&self, id: CharacterId) -> Result<Vec<EquipmentRow>, ApiError>;

    async fn add_equipment(
        &self,
        id: CharacterId,
        entry: &EquipmentEntry,
    ) -> Result<EquipmentRow, ApiError>;

    async fn remove_equipment(&self, id: CharacterId, row: EquipmentRowId) -> Result<(), ApiError>;

    async fn list_spells(&self, id: CharacterId) -> Result<Vec<SpellRow>, ApiError>;

    async fn add_spell(&self, id: CharacterId, spell: SpellId) -> Result<SpellRow, ApiError>;

    async fn remove_spell(&self, id: CharacterId, row: SpellRowId) -> Result<(), ApiError>;

    async fn stats(&self, id: CharacterId) -> Result<CharacterStats, ApiError>;

    async fn validation(&self, id: CharacterId) -> Result<ValidationReport, ApiError>;

    async fn level_up(&self, id: CharacterId, class_slug: &str) -> Result<LevelUpResult, ApiError>;

    /// Returns the HP gained.
    async fn choose_hp(
        &self,
        id: CharacterId,
        class_slug: &str,
        method: HpMethod,
    ) -> Result<i32, ApiError>;
}

/// Read-only reference data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompendiumApi: Send + Sync {
    async fn race(&self, id: RaceId) -> Result<RaceRef, ApiError>;

    async fn class(&self, id: ClassId) -> Result<ClassRef, ApiError>;

    async fn background(&self, id: BackgroundId) -> Result<BackgroundRef, ApiError>;
}
