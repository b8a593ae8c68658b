//! Wire DTO to domain conversions.
//!
//! Reference data is converted leniently: malformed or absent option lists
//! degrade to `ChoiceOptions::Unavailable` with a warning instead of failing
//! the whole response.

use charwright_domain::{
    Ability, AbilityScoreMethod, AbilityScores, BackgroundId, BackgroundRef, BundleItem,
    CharacterId, CharacterPatch, CharacterSnapshot, CharacterStats, CharacterStatus, ChoiceKey,
    ChoiceOption, ChoiceOptions, ChoiceSource, ChoiceType, ClassEntry, ClassEntryId, ClassId,
    ClassRef, EquipmentBundle, EquipmentEntry, EquipmentRow, EquipmentRowId, ItemId,
    LevelProgression, LevelUpResult, Modifier, OptionId, PendingChoice, PendingLevelUp,
    ProficiencyGroup, PublicId, RaceId, RaceRef, SpellId, SpellRow, SpellRowId, SubclassId,
    SubraceId, SubraceRef, ValidationReport,
};
use charwright_shared::{
    AbilityScoresDto, AddEquipmentRequest, BackgroundResponse, CharacterResponse,
    ClassEntryResponse, ClassResponse, EquipmentRowResponse, LevelUpResponse, ModifierDto,
    OptionDto, PendingChoiceDto, ProficiencyChoiceDto, RaceResponse, SpellRowResponse,
    StatsResponse, UpdateCharacterRequest, ValidationResponse,
};
use serde_json::Value;

pub fn abilities_from_dto(dto: AbilityScoresDto) -> AbilityScores {
    AbilityScores {
        strength: dto.strength,
        dexterity: dto.dexterity,
        constitution: dto.constitution,
        intelligence: dto.intelligence,
        wisdom: dto.wisdom,
        charisma: dto.charisma,
    }
}

pub fn abilities_to_dto(scores: &AbilityScores) -> AbilityScoresDto {
    AbilityScoresDto {
        strength: scores.strength,
        dexterity: scores.dexterity,
        constitution: scores.constitution,
        intelligence: scores.intelligence,
        wisdom: scores.wisdom,
        charisma: scores.charisma,
    }
}

pub fn class_entry(dto: ClassEntryResponse) -> ClassEntry {
    ClassEntry {
        id: Some(ClassEntryId::new(dto.id)),
        class_id: ClassId::new(dto.class_id),
        subclass_id: dto.subclass_id.map(SubclassId::new),
        level: dto.level,
        is_primary: dto.is_primary,
        order: dto.order,
    }
}

pub fn snapshot(dto: CharacterResponse) -> CharacterSnapshot {
    let ability_method = dto
        .ability_score_method
        .as_deref()
        .and_then(|m| m.parse::<AbilityScoreMethod>().ok());
    let classes: Vec<ClassEntry> = dto.classes.into_iter().map(class_entry).collect();
    let level = dto.level.unwrap_or_else(|| {
        classes
            .iter()
            .map(|c| c.level)
            .fold(0u8, u8::saturating_add)
            .max(1)
    });

    CharacterSnapshot {
        id: CharacterId::new(dto.id),
        public_id: dto.public_id.map(PublicId::new),
        name: dto.name,
        level,
        status: dto
            .status
            .as_deref()
            .map(CharacterStatus::from_wire)
            .unwrap_or_default(),
        race_id: dto.race_id.map(RaceId::new),
        subrace_id: dto.subrace_id.map(SubraceId::new),
        classes,
        background_id: dto.background_id.map(BackgroundId::new),
        abilities: dto.ability_scores.map(abilities_from_dto),
        ability_method,
        pending_level_up: dto.pending_level_up.map(|p| PendingLevelUp {
            class_slug: p.class_slug,
            hp_choice_pending: p.hp_choice_pending,
            asi_pending: p.asi_pending,
        }),
    }
}

pub fn patch_request(patch: &CharacterPatch) -> UpdateCharacterRequest {
    UpdateCharacterRequest {
        name: patch.name.clone(),
        race_id: patch.race_id.map(RaceId::get),
        subrace_id: patch.subrace_id.map(|s| s.map(SubraceId::get)),
        background_id: patch.background_id.map(BackgroundId::get),
        ability_scores: patch.abilities.as_ref().map(abilities_to_dto),
        ability_score_method: patch.ability_method.map(|m| m.as_str().to_string()),
        status: patch.status.map(|s| s.as_str().to_string()),
    }
}

pub fn equipment_request(entry: &EquipmentEntry) -> AddEquipmentRequest {
    match entry {
        EquipmentEntry::Catalog { item_id, quantity } => AddEquipmentRequest {
            item_id: Some(item_id.get()),
            custom_name: None,
            quantity: *quantity,
        },
        EquipmentEntry::Custom { name, quantity } => AddEquipmentRequest {
            item_id: None,
            custom_name: Some(name.clone()),
            quantity: *quantity,
        },
    }
}

pub fn equipment_row(dto: EquipmentRowResponse) -> EquipmentRow {
    let entry = match (dto.item_id, dto.custom_name) {
        (Some(item_id), _) => EquipmentEntry::Catalog {
            item_id: ItemId::new(item_id),
            quantity: dto.quantity,
        },
        (None, custom) => EquipmentEntry::Custom {
            name: custom
                .or_else(|| dto.name.clone())
                .unwrap_or_default(),
            quantity: dto.quantity,
        },
    };
    EquipmentRow {
        id: EquipmentRowId::new(dto.id),
        entry,
        name: dto.name,
    }
}

pub fn spell_row(dto: SpellRowResponse) -> SpellRow {
    SpellRow {
        id: SpellRowId::new(dto.id),
        spell_id: SpellId::new(dto.spell_id),
        name: dto.name,
    }
}

pub fn stats(dto: StatsResponse) -> CharacterStats {
    CharacterStats {
        armor_class: dto.armor_class,
        max_hp: dto.max_hp,
        initiative: dto.initiative,
        speed: dto.speed,
        proficiency_bonus: dto.proficiency_bonus,
        passive_perception: dto.passive_perception,
    }
}

pub fn validation(dto: ValidationResponse) -> ValidationReport {
    ValidationReport {
        is_complete: dto.is_complete,
        missing: dto.missing,
    }
}

pub fn level_up_result(dto: LevelUpResponse) -> LevelUpResult {
    LevelUpResult {
        previous_level: dto.previous_level,
        new_level: dto.new_level,
        hp_increase: dto.hp_increase,
        features_gained: dto
            .features_gained
            .iter()
            .filter_map(feature_name)
            .collect(),
        spell_slots: dto.spell_slots.as_ref().map(spell_slots).unwrap_or_default(),
        asi_pending: dto.asi_pending,
        hp_choice_pending: dto.hp_choice_pending,
    }
}

fn feature_name(value: &Value) -> Option<String> {
    match value {
        Value::String(name) => Some(name.clone()),
        Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Accepts `[4, 2]` or `{"1": 4, "2": 2}`.
fn spell_slots(value: &Value) -> Vec<u8> {
    fn slot(value: &Value) -> u8 {
        value
            .as_u64()
            .and_then(|n| u8::try_from(n).ok())
            .unwrap_or(0)
    }
    match value {
        Value::Array(items) => items.iter().map(slot).collect(),
        Value::Object(map) => {
            let mut levels: Vec<(u32, u8)> = map
                .iter()
                .filter_map(|(k, v)| k.parse::<u32>().ok().map(|level| (level, slot(v))))
                .collect();
            levels.sort_unstable();
            levels.into_iter().map(|(_, count)| count).collect()
        }
        _ => Vec::new(),
    }
}

fn option_id(value: &Value) -> Option<OptionId> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(OptionId::new(s.trim())),
        Value::Number(n) => Some(OptionId::new(n.to_string())),
        _ => None,
    }
}

fn inline_option(value: &Value) -> Option<ChoiceOption> {
    match value {
        Value::Object(map) => {
            let id = map
                .get("id")
                .or_else(|| map.get("slug"))
                .and_then(option_id)?;
            let name = map
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| id.to_string());
            let option = ChoiceOption::new(id, name);
            Some(match map.get("description").and_then(Value::as_str) {
                Some(description) => option.with_description(description),
                None => option,
            })
        }
        other => option_id(other).map(|id| ChoiceOption::new(id.clone(), id.to_string())),
    }
}

fn quantity_of(map: &serde_json::Map<String, Value>) -> u32 {
    map.get("quantity")
        .and_then(Value::as_u64)
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or(1)
}

fn bundle_item(value: &Value) -> Option<BundleItem> {
    let map = value.as_object()?;
    let quantity = quantity_of(map);
    let name = map.get("name").and_then(Value::as_str).map(str::to_string);

    if let Some(item_id) = map.get("item_id").and_then(Value::as_i64) {
        return Some(BundleItem::Catalog {
            item_id: ItemId::new(item_id),
            name: name.unwrap_or_else(|| format!("Item {}", item_id)),
            quantity,
        });
    }
    if let Some(category) = map.get("category").and_then(Value::as_str) {
        return Some(BundleItem::Category {
            category: category.to_string(),
            name: name.unwrap_or_else(|| format!("any {}", category)),
            quantity,
        });
    }
    name.map(|name| BundleItem::Flavor { name, quantity })
}

fn bundle(value: &Value) -> Option<EquipmentBundle> {
    let map = value.as_object()?;
    let id = map
        .get("id")
        .or_else(|| map.get("option"))
        .and_then(option_id)?;
    let items: Vec<BundleItem> = map
        .get("items")?
        .as_array()?
        .iter()
        .filter_map(bundle_item)
        .collect();
    let label = map
        .get("label")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            items
                .iter()
                .map(BundleItem::name)
                .collect::<Vec<_>>()
                .join(", ")
        });
    Some(EquipmentBundle::new(id, label, items))
}

/// Interpret the `options` payload of a pending choice.
pub fn choice_options(
    choice_id: &str,
    choice_type: &ChoiceType,
    options: Option<&Value>,
    endpoint: Option<&str>,
) -> ChoiceOptions {
    if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
        return ChoiceOptions::Deferred {
            endpoint: endpoint.to_string(),
        };
    }

    match options {
        None | Some(Value::Null) => ChoiceOptions::Unavailable,
        Some(Value::Object(map)) => match map.get("endpoint").and_then(Value::as_str) {
            Some(endpoint) => ChoiceOptions::Deferred {
                endpoint: endpoint.to_string(),
            },
            None => {
                tracing::warn!(choice_id, "Unrecognised options object, treating as no options");
                ChoiceOptions::Unavailable
            }
        },
        Some(Value::Array(items)) if *choice_type == ChoiceType::Equipment => {
            let bundles: Vec<EquipmentBundle> = items.iter().filter_map(bundle).collect();
            if bundles.len() != items.len() {
                tracing::warn!(
                    choice_id,
                    dropped = items.len() - bundles.len(),
                    "Dropped malformed equipment bundles"
                );
            }
            ChoiceOptions::Bundles(bundles)
        }
        Some(Value::Array(items)) => {
            let options: Vec<ChoiceOption> = items.iter().filter_map(inline_option).collect();
            if options.len() != items.len() {
                tracing::warn!(
                    choice_id,
                    dropped = items.len() - options.len(),
                    "Dropped malformed choice options"
                );
            }
            ChoiceOptions::Inline(options)
        }
        Some(_) => {
            tracing::warn!(choice_id, "Options payload is not a list, treating as no options");
            ChoiceOptions::Unavailable
        }
    }
}

pub fn pending_choice(dto: PendingChoiceDto) -> PendingChoice {
    let choice_type = ChoiceType::from_wire(&dto.choice_type);
    if !choice_type.is_recognized() {
        tracing::debug!(choice_id = %dto.id, choice_type = %choice_type, "Unrecognised choice type");
    }
    let source = ChoiceSource::from_wire(&dto.source);
    let options = choice_options(
        &dto.id,
        &choice_type,
        dto.options.as_ref(),
        dto.options_endpoint.as_deref(),
    );
    let selected: Vec<OptionId> = dto.selected.iter().filter_map(option_id).collect();

    let mut choice = PendingChoice::new(ChoiceKey::new(dto.id), choice_type, source, dto.quantity)
        .with_options(options)
        .with_selected(selected);
    if let Some(remaining) = dto.remaining {
        choice = choice.with_remaining(remaining);
    }
    if let Some(subtype) = dto.subtype.filter(|s| !s.trim().is_empty()) {
        choice = choice.with_subtype(subtype);
    }
    if let Some(name) = dto.source_name {
        choice = choice.with_source_name(name);
    }
    if let Some(level) = dto.level_granted {
        choice = choice.with_level(level);
    }
    if !dto.required {
        choice = choice.optional();
    }
    choice
}

fn modifier(dto: ModifierDto) -> Modifier {
    Modifier {
        category: dto.category,
        subcategory: dto.subcategory,
        value: dto.value,
    }
}

fn option(dto: OptionDto) -> ChoiceOption {
    let option = ChoiceOption::new(dto.id, dto.name);
    match dto.description {
        Some(description) => option.with_description(description),
        None => option,
    }
}

fn proficiency_group(dto: ProficiencyChoiceDto) -> ProficiencyGroup {
    ProficiencyGroup::new(
        dto.group,
        dto.choose,
        dto.options.into_iter().map(option).collect(),
    )
}

pub fn race(dto: RaceResponse) -> RaceRef {
    RaceRef {
        id: RaceId::new(dto.id),
        name: dto.name,
        subraces: dto
            .subraces
            .into_iter()
            .map(|s| SubraceRef {
                id: SubraceId::new(s.id),
                name: s.name,
                modifiers: s.modifiers.into_iter().map(modifier).collect(),
            })
            .collect(),
        modifiers: dto.modifiers.into_iter().map(modifier).collect(),
        proficiency_groups: dto
            .proficiency_choices
            .into_iter()
            .map(proficiency_group)
            .collect(),
    }
}

pub fn class(dto: ClassResponse) -> ClassRef {
    let spellcasting_ability = dto.spellcasting_ability.as_deref().and_then(|a| {
        a.parse::<Ability>()
            .map_err(|e| tracing::warn!(class = %dto.slug, error = %e, "Ignoring spellcasting ability"))
            .ok()
    });
    ClassRef {
        id: ClassId::new(dto.id),
        name: dto.name,
        slug: dto.slug,
        hit_die: dto.hit_die,
        spellcasting_ability,
        progression: dto
            .progression
            .into_iter()
            .map(|row| LevelProgression {
                level: row.level,
                cantrips_known: row.cantrips_known.unwrap_or(0),
                spells_known: row.spells_known.unwrap_or(0),
                spell_slots: row.spell_slots,
            })
            .collect(),
        proficiency_groups: dto
            .proficiency_choices
            .into_iter()
            .map(proficiency_group)
            .collect(),
        subclass_level: dto.subclass_level,
    }
}

pub fn background(dto: BackgroundResponse) -> BackgroundRef {
    BackgroundRef {
        id: BackgroundId::new(dto.id),
        name: dto.name,
        proficiency_groups: dto
            .proficiency_choices
            .into_iter()
            .map(proficiency_group)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dto(value: Value) -> PendingChoiceDto {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn converts_asi_choice_with_subtype() {
        let choice = pending_choice(dto(json!({
            "id": "ability_score|class|5|4|asi_or_feat",
            "type": "ability_score",
            "subtype": "asi_or_feat",
            "source": "class",
            "source_name": "Fighter",
            "level_granted": 4,
            "quantity": 1,
            "remaining": 1,
            "options": [{"id": "asi", "name": "Ability Score Improvement"}, {"id": "feat", "name": "Feat"}]
        })));
        assert_eq!(choice.kind(), charwright_domain::ChoiceKind::AsiOrFeat);
        assert_eq!(choice.display_name(), "Fighter");
        assert_eq!(choice.options.option_ids().len(), 2);
    }

    #[test]
    fn equipment_bundles_keep_all_item_shapes() {
        let choice = pending_choice(dto(json!({
            "id": "equipment|class|5|1|weapons",
            "type": "equipment",
            "source": "class",
            "options": [
                {"id": "a", "items": [{"item_id": 1, "name": "Mace"}]},
                {"id": "b", "items": [{"category": "martial-weapons", "name": "any martial weapon"}]},
                {"id": "c", "items": [{"name": "a lucky charm", "quantity": 1}]}
            ]
        })));
        let ChoiceOptions::Bundles(bundles) = &choice.options else {
            panic!("expected bundles");
        };
        assert!(matches!(bundles[0].items[0], BundleItem::Catalog { .. }));
        assert!(matches!(bundles[1].items[0], BundleItem::Category { .. }));
        assert!(matches!(bundles[2].items[0], BundleItem::Flavor { .. }));
        assert_eq!(bundles[0].label, "Mace");
    }

    #[test]
    fn malformed_options_degrade_to_unavailable() {
        let choice = pending_choice(dto(json!({
            "id": "language|race|2|1|languages",
            "type": "language",
            "source": "race",
            "options": "elvish, dwarvish"
        })));
        assert_eq!(choice.options, ChoiceOptions::Unavailable);
    }

    #[test]
    fn partially_malformed_options_keep_good_entries() {
        let choice = pending_choice(dto(json!({
            "id": "proficiency|class|5|1|skills",
            "type": "proficiency",
            "subtype": "skill",
            "source": "class",
            "quantity": 2,
            "options": [{"id": "athletics", "name": "Athletics"}, {"name": "no id"}, "history", 7]
        })));
        assert_eq!(choice.options.option_ids().len(), 3);
    }

    #[test]
    fn endpoint_means_deferred() {
        let choice = pending_choice(dto(json!({
            "id": "spell|class|12|1|cantrips",
            "type": "spell",
            "subtype": "cantrip",
            "source": "class",
            "options_endpoint": "/spells?class=wizard&level=0"
        })));
        assert!(matches!(choice.options, ChoiceOptions::Deferred { .. }));
    }

    #[test]
    fn numeric_selected_ids_and_missing_remaining() {
        let choice = pending_choice(dto(json!({
            "id": "spell|class|12|1|spells",
            "type": "spell",
            "source": "class",
            "quantity": 2,
            "selected": [101, "102"]
        })));
        assert_eq!(choice.selected, vec![OptionId::from("101"), OptionId::from("102")]);
        assert_eq!(choice.remaining, 0);
    }

    #[test]
    fn explicit_zero_remaining_with_empty_selection() {
        let choice = pending_choice(dto(json!({
            "id": "language|race|2|1|languages",
            "type": "language",
            "source": "race",
            "quantity": 1,
            "remaining": 0,
            "selected": []
        })));
        assert!(choice.is_satisfied());
    }

    #[test]
    fn spell_slots_accept_map_or_list() {
        assert_eq!(spell_slots(&json!([4, 2])), vec![4, 2]);
        assert_eq!(spell_slots(&json!({"2": 2, "1": 4})), vec![4, 2]);
        assert!(spell_slots(&json!("none")).is_empty());
    }

    #[test]
    fn custom_equipment_rows_keep_their_name() {
        let row = equipment_row(EquipmentRowResponse {
            id: 4,
            item_id: None,
            custom_name: Some("a trinket".into()),
            name: None,
            quantity: 1,
        });
        assert_eq!(
            row.entry,
            EquipmentEntry::Custom {
                name: "a trinket".into(),
                quantity: 1
            }
        );
    }

    #[test]
    fn unknown_spellcasting_ability_is_ignored() {
        let class = class(ClassResponse {
            id: 1,
            name: "Oddity".into(),
            slug: "oddity".into(),
            hit_die: 8,
            spellcasting_ability: Some("luck".into()),
            progression: Vec::new(),
            proficiency_choices: Vec::new(),
            subclass_level: None,
        });
        assert_eq!(class.spellcasting_ability, None);
    }
}
