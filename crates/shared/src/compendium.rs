//! Compendium reference data: races, classes and backgrounds.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierDto {
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub value: Option<i32>,
}

/// "Choose `choose` from `options`" as declared by reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProficiencyChoiceDto {
    pub group: String,
    #[serde(default = "default_choose")]
    pub choose: u32,
    #[serde(default)]
    pub options: Vec<OptionDto>,
}

fn default_choose() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubraceResponse {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub modifiers: Vec<ModifierDto>,
}

/// `GET /races/:id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceResponse {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub subraces: Vec<SubraceResponse>,
    #[serde(default)]
    pub modifiers: Vec<ModifierDto>,
    #[serde(default)]
    pub proficiency_choices: Vec<ProficiencyChoiceDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionRowDto {
    pub level: u8,
    #[serde(default)]
    pub cantrips_known: Option<u8>,
    #[serde(default)]
    pub spells_known: Option<u8>,
    #[serde(default)]
    pub spell_slots: Vec<u8>,
}

/// `GET /classes/:id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassResponse {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default = "default_hit_die")]
    pub hit_die: u8,
    #[serde(default)]
    pub spellcasting_ability: Option<String>,
    #[serde(default)]
    pub progression: Vec<ProgressionRowDto>,
    #[serde(default)]
    pub proficiency_choices: Vec<ProficiencyChoiceDto>,
    #[serde(default)]
    pub subclass_level: Option<u8>,
}

fn default_hit_die() -> u8 {
    8
}

/// `GET /backgrounds/:id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundResponse {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub proficiency_choices: Vec<ProficiencyChoiceDto>,
}
