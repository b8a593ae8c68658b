//! Response bodies returned by the rules backend.
//!
//! Fields the backend may omit default instead of failing; the engine
//! decides how to degrade.

use serde::{Deserialize, Serialize};

use crate::requests::AbilityScoresDto;

/// A character record. Also the body of `POST /characters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterResponse {
    pub id: i64,
    #[serde(rename = "publicId", alias = "public_id", default)]
    pub public_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub race_id: Option<i64>,
    #[serde(default)]
    pub subrace_id: Option<i64>,
    #[serde(default)]
    pub background_id: Option<i64>,
    #[serde(default)]
    pub ability_scores: Option<AbilityScoresDto>,
    #[serde(default)]
    pub ability_score_method: Option<String>,
    #[serde(default)]
    pub classes: Vec<ClassEntryResponse>,
    #[serde(default)]
    pub pending_level_up: Option<PendingLevelUpResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntryResponse {
    pub id: i64,
    pub class_id: i64,
    #[serde(default)]
    pub subclass_id: Option<i64>,
    #[serde(default = "default_level")]
    pub level: u8,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub order: u32,
}

fn default_level() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassListResponse {
    #[serde(default)]
    pub classes: Vec<ClassEntryResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLevelUpResponse {
    pub class_slug: String,
    #[serde(default)]
    pub hp_choice_pending: bool,
    #[serde(default)]
    pub asi_pending: bool,
}

/// `GET /characters/:id/pending-choices`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChoicesResponse {
    #[serde(default)]
    pub choices: Vec<PendingChoiceDto>,
}

/// One pending choice as sent by the backend.
///
/// `selected` entries may be strings or numbers and `options` may take
/// several shapes, so both are kept as raw JSON for the engine to interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChoiceDto {
    pub id: String,
    #[serde(rename = "type")]
    pub choice_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub level_granted: Option<u8>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub remaining: Option<u32>,
    #[serde(default)]
    pub selected: Vec<serde_json::Value>,
    #[serde(default)]
    pub options: Option<serde_json::Value>,
    #[serde(default)]
    pub options_endpoint: Option<String>,
}

fn default_required() -> bool {
    true
}

fn default_quantity() -> u32 {
    1
}

/// Echo of `POST /characters/:id/choices/:choiceId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveChoiceResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub selected: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentRowResponse {
    pub id: i64,
    #[serde(default)]
    pub item_id: Option<i64>,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentListResponse {
    #[serde(default)]
    pub equipment: Vec<EquipmentRowResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellRowResponse {
    pub id: i64,
    pub spell_id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellListResponse {
    #[serde(default)]
    pub spells: Vec<SpellRowResponse>,
}

/// `GET /characters/:id/stats`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub armor_class: Option<i32>,
    #[serde(default)]
    pub max_hp: Option<i32>,
    #[serde(default)]
    pub initiative: Option<i32>,
    #[serde(default)]
    pub speed: Option<i32>,
    #[serde(default)]
    pub proficiency_bonus: Option<i32>,
    #[serde(default)]
    pub passive_perception: Option<i32>,
}

/// `GET /characters/:id/validation`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub is_complete: bool,
    #[serde(default)]
    pub missing: Vec<String>,
}

/// `POST /characters/:id/classes/:slug/level-up`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelUpResponse {
    pub previous_level: u8,
    pub new_level: u8,
    #[serde(default)]
    pub hp_increase: Option<i32>,
    #[serde(default)]
    pub features_gained: Vec<serde_json::Value>,
    #[serde(default)]
    pub spell_slots: Option<serde_json::Value>,
    #[serde(default)]
    pub asi_pending: bool,
    #[serde(default)]
    pub hp_choice_pending: bool,
}

/// `POST /characters/:id/classes/:slug/hp-choice`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpChoiceResponse {
    pub hp_increase: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_response_reads_public_id() {
        let body: CharacterResponse = serde_json::from_value(serde_json::json!({
            "id": 12,
            "publicId": "thorin-x1",
            "name": "Thorin",
            "status": "draft"
        }))
        .unwrap();
        assert_eq!(body.public_id.as_deref(), Some("thorin-x1"));
        assert!(body.classes.is_empty());
        assert_eq!(body.level, None);
    }

    #[test]
    fn pending_choice_defaults() {
        let dto: PendingChoiceDto = serde_json::from_value(serde_json::json!({
            "id": "language|race|2|1|languages",
            "type": "language",
            "source": "race"
        }))
        .unwrap();
        assert!(dto.required);
        assert_eq!(dto.quantity, 1);
        assert_eq!(dto.remaining, None);
        assert!(dto.options.is_none());
    }

    #[test]
    fn level_up_response_tolerates_missing_lists() {
        let body: LevelUpResponse = serde_json::from_value(serde_json::json!({
            "previous_level": 3,
            "new_level": 4,
            "asi_pending": true
        }))
        .unwrap();
        assert!(body.asi_pending);
        assert!(!body.hp_choice_pending);
        assert!(body.features_gained.is_empty());
    }
}
