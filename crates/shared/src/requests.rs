//! Request bodies sent to the rules backend.

use serde::{Deserialize, Deserializer, Serialize};

/// Distinguishes an absent field from an explicit `null` when deserializing
/// `Option<Option<T>>` fields.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// `POST /characters`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCharacterRequest {
    pub name: String,
}

/// The six base scores as sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScoresDto {
    pub strength: u8,
    pub dexterity: u8,
    pub constitution: u8,
    pub intelligence: u8,
    pub wisdom: u8,
    pub charisma: u8,
}

/// `PATCH /characters/:id`
///
/// Absent fields are left untouched. `subrace_id: Some(None)` is sent as an
/// explicit `null` and clears the subrace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateCharacterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub race_id: Option<i64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_some"
    )]
    pub subrace_id: Option<Option<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability_scores: Option<AbilityScoresDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability_score_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// `POST /characters/:id/classes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddClassRequest {
    pub class_id: i64,
    pub level: u8,
    pub is_primary: bool,
}

/// `POST /characters/:id/choices/:choiceId`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveChoiceRequest {
    pub source: String,
    pub choice_group: String,
    pub selected: Vec<String>,
}

/// `POST /characters/:id/equipment`
///
/// Exactly one of `item_id` and `custom_name` is set; custom rows carry
/// free-text items that have no catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddEquipmentRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    pub quantity: u32,
}

/// `POST /characters/:id/spells`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSpellRequest {
    pub spell_id: i64,
}

/// `POST /characters/:id/classes/:slug/hp-choice`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpChoiceRequest {
    pub method: String,
}
