//! In-memory rules backend for offline runs and tests.
//!
//! Equipment and spells are real rows with their own ids, so the
//! delete-then-recreate protocol can be observed end to end. Pending choices
//! are regenerated on every read from templates attached to the selected
//! race, subrace, class and background; resolved choices stay listed with
//! their selection echoed and nothing remaining.
//!
//! Every operation yields once before touching state, which lets concurrent
//! callers interleave the way they would against a real server.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use charwright_domain::{
    Ability, BackgroundId, BackgroundRef, BundleItem, CharacterId, CharacterPatch,
    CharacterSnapshot, CharacterStats, ChoiceKey, ChoiceKind, ChoiceOption, ChoiceOptions,
    ChoiceSource, ChoiceType, ClassEntry, ClassEntryId, ClassId, ClassRef, EquipmentBundle,
    EquipmentEntry, EquipmentRow, EquipmentRowId, HpMethod, ItemId, LevelProgression,
    LevelUpResult, Modifier, OptionId, PendingChoice, PendingLevelUp, ProficiencyGroup, PublicId,
    RaceId, RaceRef, SpellId, SpellRow, SpellRowId, SubraceId, SubraceRef, ValidationReport,
};
use rand::Rng;
use tokio::sync::RwLock;

use crate::infrastructure::ports::{ApiError, CharacterApi, ChoiceResolution, CompendiumApi};

/// Which selection makes a templated choice appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceScope {
    Race(RaceId),
    Subrace(SubraceId),
    /// Appears once the class reaches the choice's `level_granted`.
    Class(ClassId),
    Background(BackgroundId),
}

#[derive(Debug, Clone)]
struct ChoiceTemplate {
    scope: ChoiceScope,
    choice: PendingChoice,
}

#[derive(Debug, Clone)]
struct CharacterRecord {
    snapshot: CharacterSnapshot,
    equipment: Vec<EquipmentRow>,
    spells: Vec<SpellRow>,
    resolutions: BTreeMap<ChoiceKey, Vec<OptionId>>,
}

#[derive(Debug, Default)]
struct BackendState {
    next_id: i64,
    characters: BTreeMap<CharacterId, CharacterRecord>,
    races: BTreeMap<RaceId, RaceRef>,
    classes: BTreeMap<ClassId, ClassRef>,
    backgrounds: BTreeMap<BackgroundId, BackgroundRef>,
    items: BTreeMap<ItemId, String>,
    spell_names: BTreeMap<SpellId, String>,
    templates: Vec<ChoiceTemplate>,
    calls: Vec<String>,
    failures: HashMap<&'static str, VecDeque<ApiError>>,
}

impl BackendState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&self, id: CharacterId) -> Result<&CharacterRecord, ApiError> {
        self.characters
            .get(&id)
            .ok_or_else(|| ApiError::not_found("Character", id))
    }

    fn record_mut(&mut self, id: CharacterId) -> Result<&mut CharacterRecord, ApiError> {
        self.characters
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found("Character", id))
    }

    fn applies(
        &self,
        scope: ChoiceScope,
        choice: &PendingChoice,
        snapshot: &CharacterSnapshot,
    ) -> bool {
        match scope {
            ChoiceScope::Race(id) => snapshot.race_id == Some(id),
            ChoiceScope::Subrace(id) => snapshot.subrace_id == Some(id),
            ChoiceScope::Class(id) => snapshot
                .classes
                .iter()
                .any(|c| c.class_id == id && c.level >= choice.level_granted.unwrap_or(1)),
            ChoiceScope::Background(id) => snapshot.background_id == Some(id),
        }
    }

    fn pending(&self, id: CharacterId) -> Result<Vec<PendingChoice>, ApiError> {
        let record = self.record(id)?;
        Ok(self
            .templates
            .iter()
            .filter(|t| self.applies(t.scope, &t.choice, &record.snapshot))
            .map(|t| match record.resolutions.get(&t.choice.key) {
                Some(selected) => t.choice.clone().with_selected(selected.clone()),
                None => t.choice.clone(),
            })
            .collect())
    }

    fn class_by_slug(&self, slug: &str) -> Result<&ClassRef, ApiError> {
        self.classes
            .values()
            .find(|c| c.slug == slug)
            .ok_or_else(|| ApiError::not_found("Class", slug))
    }

    /// Drop the level-up record once HP, the ASI and every required choice
    /// the class gained at its new level are answered.
    fn clear_finished_level_up(&mut self, id: CharacterId) -> Result<(), ApiError> {
        let record = self.record(id)?;
        let Some(level_up) = record.snapshot.pending_level_up.as_ref() else {
            return Ok(());
        };
        if level_up.hp_choice_pending || level_up.asi_pending {
            return Ok(());
        }
        let class = self.class_by_slug(&level_up.class_slug)?;
        let Some(class_level) = record
            .snapshot
            .classes
            .iter()
            .find(|c| c.class_id == class.id)
            .map(|c| c.level)
        else {
            return Ok(());
        };

        let open = self.templates.iter().any(|t| {
            t.scope == ChoiceScope::Class(class.id)
                && t.choice.required
                && t.choice.level_granted == Some(class_level)
                && !record.resolutions.contains_key(&t.choice.key)
        });
        if !open {
            self.record_mut(id)?.snapshot.pending_level_up = None;
        }
        Ok(())
    }
}

/// Rules backend held entirely in memory.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<RwLock<BackendState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply builder configuration. Builders run before the backend is in
    /// use; a held lock means the change is skipped.
    fn configure(self, apply: impl FnOnce(&mut BackendState)) -> Self {
        match self.state.try_write() {
            Ok(mut state) => apply(&mut state),
            Err(_) => tracing::warn!("In-memory backend is busy, configuration skipped"),
        }
        self
    }

    pub fn with_race(self, race: RaceRef) -> Self {
        self.configure(|s| {
            s.races.insert(race.id, race);
        })
    }

    pub fn with_class(self, class: ClassRef) -> Self {
        self.configure(|s| {
            s.classes.insert(class.id, class);
        })
    }

    pub fn with_background(self, background: BackgroundRef) -> Self {
        self.configure(|s| {
            s.backgrounds.insert(background.id, background);
        })
    }

    pub fn with_item(self, id: ItemId, name: impl Into<String>) -> Self {
        let name = name.into();
        self.configure(|s| {
            s.items.insert(id, name);
        })
    }

    pub fn with_spell(self, id: SpellId, name: impl Into<String>) -> Self {
        let name = name.into();
        self.configure(|s| {
            s.spell_names.insert(id, name);
        })
    }

    pub fn with_choice(self, scope: ChoiceScope, choice: PendingChoice) -> Self {
        self.configure(|s| s.templates.push(ChoiceTemplate { scope, choice }))
    }

    /// Store a character as-is, e.g. one that is mid level-up.
    pub async fn insert_character(&self, snapshot: CharacterSnapshot) {
        let mut state = self.state.write().await;
        state.next_id = state.next_id.max(snapshot.id.get());
        state.characters.insert(
            snapshot.id,
            CharacterRecord {
                snapshot,
                equipment: Vec::new(),
                spells: Vec::new(),
                resolutions: BTreeMap::new(),
            },
        );
    }

    /// Make the next call to `operation` fail with `error`.
    pub async fn fail_next(&self, operation: &'static str, error: ApiError) {
        self.state
            .write()
            .await
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Operations performed so far, in order, e.g. `"remove_equipment 3"`.
    pub async fn calls(&self) -> Vec<String> {
        self.state.read().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.write().await.calls.clear();
    }

    async fn enter(
        &self,
        operation: &'static str,
        detail: impl std::fmt::Display,
    ) -> Result<(), ApiError> {
        tokio::task::yield_now().await;
        let mut state = self.state.write().await;
        state.calls.push(format!("{} {}", operation, detail).trim_end().to_string());
        if let Some(error) = state.failures.get_mut(operation).and_then(VecDeque::pop_front) {
            tracing::debug!(operation, error = %error, "Injected failure");
            return Err(error);
        }
        Ok(())
    }

    /// Dwarf, elf and variant human, a fighter, a wizard and an acolyte;
    /// enough to walk the creation wizard without a server.
    pub fn demo() -> Self {
        let skills = |ids: &[&str]| -> Vec<ChoiceOption> {
            ids.iter()
                .map(|id| ChoiceOption::new(*id, title_case(id)))
                .collect()
        };
        let dwarf = RaceRef::new(RaceId::new(1), "Dwarf");
        let elf = RaceRef::new(RaceId::new(2), "Elf").with_subraces(vec![
            SubraceRef::new(SubraceId::new(21), "High Elf"),
            SubraceRef::new(SubraceId::new(22), "Wood Elf"),
        ]);
        let variant_human = RaceRef::new(RaceId::new(3), "Variant Human")
            .with_modifier(Modifier::new("bonus_feat"));

        let fighter = ClassRef::new(ClassId::new(5), "Fighter", "fighter")
            .with_progression(vec![progression(1, 0, 0, &[])])
            .with_proficiency_group(ProficiencyGroup::new(
                "skills",
                2,
                skills(&["acrobatics", "athletics", "history", "intimidation", "perception"]),
            ));
        let fighter = ClassRef {
            hit_die: 10,
            subclass_level: Some(3),
            ..fighter
        };
        let wizard = ClassRef::new(ClassId::new(12), "Wizard", "wizard")
            .with_spellcasting(Ability::Intelligence)
            .with_progression(vec![
                progression(1, 3, 6, &[2]),
                progression(2, 3, 8, &[3]),
            ]);
        let wizard = ClassRef {
            hit_die: 6,
            ..wizard
        };
        let acolyte = BackgroundRef::new(BackgroundId::new(3), "Acolyte");

        let weapons = EquipmentBundle::new(
            "a",
            "a mace",
            vec![BundleItem::Catalog {
                item_id: ItemId::new(101),
                name: "Mace".into(),
                quantity: 1,
            }],
        );
        let warhammer = EquipmentBundle::new(
            "b",
            "a warhammer",
            vec![BundleItem::Catalog {
                item_id: ItemId::new(102),
                name: "Warhammer".into(),
                quantity: 1,
            }],
        );

        Self::new()
            .with_race(dwarf)
            .with_race(elf)
            .with_race(variant_human)
            .with_class(fighter)
            .with_class(wizard)
            .with_background(acolyte)
            .with_item(ItemId::new(101), "Mace")
            .with_item(ItemId::new(102), "Warhammer")
            .with_spell(SpellId::new(201), "Fire Bolt")
            .with_spell(SpellId::new(202), "Light")
            .with_spell(SpellId::new(203), "Mage Hand")
            .with_spell(SpellId::new(204), "Prestidigitation")
            .with_spell(SpellId::new(205), "Magic Missile")
            .with_spell(SpellId::new(206), "Shield")
            .with_choice(
                ChoiceScope::Class(ClassId::new(5)),
                PendingChoice::new(
                    ChoiceKey::compose(&ChoiceType::Proficiency, &ChoiceSource::Class, 5, 1, "skills"),
                    ChoiceType::Proficiency,
                    ChoiceSource::Class,
                    2,
                )
                .with_subtype("skill")
                .with_source_name("Fighter")
                .with_level(1)
                .with_options(ChoiceOptions::Inline(skills(&[
                    "acrobatics",
                    "athletics",
                    "history",
                    "intimidation",
                    "perception",
                ]))),
            )
            .with_choice(
                ChoiceScope::Class(ClassId::new(5)),
                PendingChoice::new(
                    ChoiceKey::compose(&ChoiceType::Equipment, &ChoiceSource::Class, 5, 1, "weapons"),
                    ChoiceType::Equipment,
                    ChoiceSource::Class,
                    1,
                )
                .with_source_name("Fighter")
                .with_level(1)
                .with_options(ChoiceOptions::Bundles(vec![weapons, warhammer])),
            )
            .with_choice(
                ChoiceScope::Class(ClassId::new(5)),
                PendingChoice::new(
                    ChoiceKey::compose(&ChoiceType::Subclass, &ChoiceSource::Class, 5, 3, "subclass"),
                    ChoiceType::Subclass,
                    ChoiceSource::Class,
                    1,
                )
                .with_source_name("Fighter")
                .with_level(3)
                .with_options(ChoiceOptions::Inline(vec![
                    ChoiceOption::new("champion", "Champion"),
                    ChoiceOption::new("battle_master", "Battle Master"),
                ])),
            )
            .with_choice(
                ChoiceScope::Class(ClassId::new(5)),
                PendingChoice::new(
                    ChoiceKey::compose(&ChoiceType::AbilityScore, &ChoiceSource::Class, 5, 4, "asi_or_feat"),
                    ChoiceType::AbilityScore,
                    ChoiceSource::Class,
                    1,
                )
                .with_subtype("asi_or_feat")
                .with_source_name("Fighter")
                .with_level(4)
                .with_options(ChoiceOptions::Inline(vec![
                    ChoiceOption::new("asi", "Ability Score Improvement"),
                    ChoiceOption::new("feat", "Feat"),
                ])),
            )
            .with_choice(
                ChoiceScope::Class(ClassId::new(12)),
                PendingChoice::new(
                    ChoiceKey::compose(&ChoiceType::Spell, &ChoiceSource::Class, 12, 1, "cantrips"),
                    ChoiceType::Spell,
                    ChoiceSource::Class,
                    3,
                )
                .with_subtype("cantrip")
                .with_source_name("Wizard")
                .with_level(1)
                .with_options(ChoiceOptions::Inline(vec![
                    ChoiceOption::new("201", "Fire Bolt"),
                    ChoiceOption::new("202", "Light"),
                    ChoiceOption::new("203", "Mage Hand"),
                    ChoiceOption::new("204", "Prestidigitation"),
                ])),
            )
            .with_choice(
                ChoiceScope::Class(ClassId::new(12)),
                PendingChoice::new(
                    ChoiceKey::compose(&ChoiceType::Spell, &ChoiceSource::Class, 12, 2, "spells"),
                    ChoiceType::Spell,
                    ChoiceSource::Class,
                    2,
                )
                .with_subtype("spell")
                .with_source_name("Wizard")
                .with_level(2)
                .with_options(ChoiceOptions::Inline(vec![
                    ChoiceOption::new("205", "Magic Missile"),
                    ChoiceOption::new("206", "Shield"),
                ])),
            )
            .with_choice(
                ChoiceScope::Background(BackgroundId::new(3)),
                PendingChoice::new(
                    ChoiceKey::compose(&ChoiceType::Language, &ChoiceSource::Background, 3, 1, "languages"),
                    ChoiceType::Language,
                    ChoiceSource::Background,
                    2,
                )
                .with_source_name("Acolyte")
                .with_options(ChoiceOptions::Inline(skills(&[
                    "dwarvish", "elvish", "giant", "gnomish", "orc",
                ]))),
            )
    }
}

fn progression(level: u8, cantrips: u8, spells: u8, slots: &[u8]) -> LevelProgression {
    LevelProgression {
        level,
        cantrips_known: cantrips,
        spells_known: spells,
        spell_slots: slots.to_vec(),
    }
}

fn title_case(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn proficiency_bonus(level: u8) -> i32 {
    2 + (i32::from(level.max(1)) - 1) / 4
}

#[async_trait]
impl CharacterApi for InMemoryBackend {
    async fn create_character(&self, name: &str) -> Result<CharacterSnapshot, ApiError> {
        self.enter("create_character", name).await?;
        let mut state = self.state.write().await;
        let id = CharacterId::new(state.next_id());
        let mut snapshot = CharacterSnapshot::new(id, name);
        snapshot.public_id = Some(PublicId::new(format!("chr-{:06}", id.get())));
        state.characters.insert(
            id,
            CharacterRecord {
                snapshot: snapshot.clone(),
                equipment: Vec::new(),
                spells: Vec::new(),
                resolutions: BTreeMap::new(),
            },
        );
        Ok(snapshot)
    }

    async fn get_character(&self, id: CharacterId) -> Result<CharacterSnapshot, ApiError> {
        self.enter("get_character", id).await?;
        let state = self.state.read().await;
        Ok(state.record(id)?.snapshot.clone())
    }

    async fn update_character(&self, id: CharacterId, patch: &CharacterPatch) -> Result<(), ApiError> {
        self.enter("update_character", id).await?;
        let mut state = self.state.write().await;
        let record = state.record_mut(id)?;
        let snapshot = &mut record.snapshot;
        if let Some(name) = &patch.name {
            snapshot.name = name.clone();
        }
        if let Some(race_id) = patch.race_id {
            if snapshot.race_id != Some(race_id) {
                snapshot.subrace_id = None;
            }
            snapshot.race_id = Some(race_id);
        }
        if let Some(subrace_id) = patch.subrace_id {
            snapshot.subrace_id = subrace_id;
        }
        if let Some(background_id) = patch.background_id {
            snapshot.background_id = Some(background_id);
        }
        if let Some(abilities) = patch.abilities {
            snapshot.abilities = Some(abilities);
        }
        if let Some(method) = patch.ability_method {
            snapshot.ability_method = Some(method);
        }
        if let Some(status) = patch.status {
            snapshot.status = status;
        }
        Ok(())
    }

    async fn delete_character(&self, id: CharacterId) -> Result<(), ApiError> {
        self.enter("delete_character", id).await?;
        let mut state = self.state.write().await;
        state
            .characters
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found("Character", id))
    }

    async fn list_classes(&self, id: CharacterId) -> Result<Vec<ClassEntry>, ApiError> {
        self.enter("list_classes", id).await?;
        let state = self.state.read().await;
        Ok(state.record(id)?.snapshot.classes.clone())
    }

    async fn add_class(
        &self,
        id: CharacterId,
        class_id: ClassId,
        level: u8,
        is_primary: bool,
    ) -> Result<ClassEntry, ApiError> {
        self.enter("add_class", class_id).await?;
        let mut state = self.state.write().await;
        if !state.classes.contains_key(&class_id) {
            return Err(ApiError::not_found("Class", class_id));
        }
        let entry_id = ClassEntryId::new(state.next_id());
        let record = state.record_mut(id)?;
        if is_primary {
            for entry in &mut record.snapshot.classes {
                entry.is_primary = false;
            }
        }
        let entry = ClassEntry {
            id: Some(entry_id),
            class_id,
            subclass_id: None,
            level,
            is_primary,
            order: u32::try_from(record.snapshot.classes.len()).unwrap_or(u32::MAX),
        };
        record.snapshot.classes.push(entry.clone());
        record.snapshot.level = record
            .snapshot
            .classes
            .iter()
            .map(|c| c.level)
            .fold(0u8, u8::saturating_add)
            .max(1);
        Ok(entry)
    }

    async fn remove_class(&self, id: CharacterId, entry_id: ClassEntryId) -> Result<(), ApiError> {
        self.enter("remove_class", entry_id).await?;
        let mut state = self.state.write().await;
        let record = state.record_mut(id)?;
        let before = record.snapshot.classes.len();
        record.snapshot.classes.retain(|c| c.id != Some(entry_id));
        if record.snapshot.classes.len() == before {
            return Err(ApiError::not_found("ClassEntry", entry_id));
        }
        Ok(())
    }

    async fn pending_choices(&self, id: CharacterId) -> Result<Vec<PendingChoice>, ApiError> {
        self.enter("pending_choices", id).await?;
        self.state.read().await.pending(id)
    }

    async fn resolve_choice(
        &self,
        id: CharacterId,
        choice: &ChoiceKey,
        resolution: &ChoiceResolution,
    ) -> Result<(), ApiError> {
        self.enter("resolve_choice", choice).await?;
        let mut state = self.state.write().await;
        let path = format!("/characters/{}/choices/{}", id, choice);
        let pending = state.pending(id)?;
        let current = pending
            .iter()
            .find(|c| &c.key == choice)
            .ok_or_else(|| ApiError::status(path.as_str(), 404, "choice not pending"))?;

        if resolution.selected.len() > usize::try_from(current.quantity).unwrap_or(usize::MAX) {
            return Err(ApiError::status(path, 422, "too many selections"));
        }
        if let Some(bad) = resolution
            .selected
            .iter()
            .find(|o| !current.options.allows(o))
        {
            return Err(ApiError::status(path, 422, format!("{} is not an option", bad)));
        }
        let resolves_asi = current.kind() == ChoiceKind::AsiOrFeat;

        let record = state.record_mut(id)?;
        record
            .resolutions
            .insert(choice.clone(), resolution.selected.clone());
        if resolves_asi {
            if let Some(pending) = record.snapshot.pending_level_up.as_mut() {
                pending.asi_pending = false;
            }
        }
        state.clear_finished_level_up(id)
    }

    async fn list_equipment(&self, id: CharacterId) -> Result<Vec<EquipmentRow>, ApiError> {
        self.enter("list_equipment", id).await?;
        Ok(self.state.read().await.record(id)?.equipment.clone())
    }

    async fn add_equipment(
        &self,
        id: CharacterId,
        entry: &EquipmentEntry,
    ) -> Result<EquipmentRow, ApiError> {
        let detail = match entry {
            EquipmentEntry::Catalog { item_id, .. } => item_id.to_string(),
            EquipmentEntry::Custom { name, .. } => name.clone(),
        };
        self.enter("add_equipment", detail).await?;
        let mut state = self.state.write().await;
        let name = match entry {
            EquipmentEntry::Catalog { item_id, .. } => Some(
                state
                    .items
                    .get(item_id)
                    .cloned()
                    .ok_or_else(|| ApiError::not_found("Item", item_id))?,
            ),
            EquipmentEntry::Custom { name, .. } => Some(name.clone()),
        };
        let row = EquipmentRow {
            id: EquipmentRowId::new(state.next_id()),
            entry: entry.clone(),
            name,
        };
        state.record_mut(id)?.equipment.push(row.clone());
        Ok(row)
    }

    async fn remove_equipment(&self, id: CharacterId, row: EquipmentRowId) -> Result<(), ApiError> {
        self.enter("remove_equipment", row).await?;
        let mut state = self.state.write().await;
        let record = state.record_mut(id)?;
        let before = record.equipment.len();
        record.equipment.retain(|r| r.id != row);
        if record.equipment.len() == before {
            return Err(ApiError::not_found("EquipmentRow", row));
        }
        Ok(())
    }

    async fn list_spells(&self, id: CharacterId) -> Result<Vec<SpellRow>, ApiError> {
        self.enter("list_spells", id).await?;
        Ok(self.state.read().await.record(id)?.spells.clone())
    }

    async fn add_spell(&self, id: CharacterId, spell: SpellId) -> Result<SpellRow, ApiError> {
        self.enter("add_spell", spell).await?;
        let mut state = self.state.write().await;
        let name = state.spell_names.get(&spell).cloned();
        let row = SpellRow {
            id: SpellRowId::new(state.next_id()),
            spell_id: spell,
            name,
        };
        state.record_mut(id)?.spells.push(row.clone());
        Ok(row)
    }

    async fn remove_spell(&self, id: CharacterId, row: SpellRowId) -> Result<(), ApiError> {
        self.enter("remove_spell", row).await?;
        let mut state = self.state.write().await;
        let record = state.record_mut(id)?;
        let before = record.spells.len();
        record.spells.retain(|r| r.id != row);
        if record.spells.len() == before {
            return Err(ApiError::not_found("SpellRow", row));
        }
        Ok(())
    }

    async fn stats(&self, id: CharacterId) -> Result<CharacterStats, ApiError> {
        self.enter("stats", id).await?;
        let state = self.state.read().await;
        let snapshot = &state.record(id)?.snapshot;
        let Some(scores) = snapshot.abilities else {
            return Ok(CharacterStats {
                proficiency_bonus: Some(proficiency_bonus(snapshot.level)),
                ..CharacterStats::default()
            });
        };
        let hit_die = snapshot
            .primary_class()
            .and_then(|entry| state.classes.get(&entry.class_id))
            .map(|class| i32::from(class.hit_die));
        let dex = scores.modifier(Ability::Dexterity);

        Ok(CharacterStats {
            armor_class: Some(10 + dex),
            max_hp: hit_die.map(|die| die + scores.modifier(Ability::Constitution)),
            initiative: Some(dex),
            speed: snapshot.race_id.map(|_| 30),
            proficiency_bonus: Some(proficiency_bonus(snapshot.level)),
            passive_perception: Some(10 + scores.modifier(Ability::Wisdom)),
        })
    }

    async fn validation(&self, id: CharacterId) -> Result<ValidationReport, ApiError> {
        self.enter("validation", id).await?;
        let state = self.state.read().await;
        let snapshot = &state.record(id)?.snapshot;

        let mut missing = Vec::new();
        if snapshot.name.trim().is_empty() {
            missing.push("name".to_string());
        }
        match snapshot.race_id.and_then(|r| state.races.get(&r)) {
            None => missing.push("race".to_string()),
            Some(race) if race.has_subraces() && snapshot.subrace_id.is_none() => {
                missing.push("subrace".to_string())
            }
            Some(_) => {}
        }
        if snapshot.classes.is_empty() {
            missing.push("class".to_string());
        }
        if snapshot.abilities.is_none() {
            missing.push("ability_scores".to_string());
        }
        if snapshot.background_id.is_none() {
            missing.push("background".to_string());
        }
        missing.extend(
            state
                .pending(id)?
                .iter()
                .filter(|c| c.is_outstanding())
                .map(|c| format!("choice:{}", c.key)),
        );

        Ok(ValidationReport {
            is_complete: missing.is_empty(),
            missing,
        })
    }

    async fn level_up(&self, id: CharacterId, class_slug: &str) -> Result<LevelUpResult, ApiError> {
        self.enter("level_up", class_slug).await?;
        let mut state = self.state.write().await;
        let class = state.class_by_slug(class_slug)?.clone();
        let record = state.record_mut(id)?;
        if record.snapshot.pending_level_up.is_some() {
            return Err(ApiError::status(
                format!("/characters/{}/classes/{}/level-up", id, class_slug),
                409,
                "a level-up is already in progress",
            ));
        }

        let previous_level = record.snapshot.level;
        let entry = record
            .snapshot
            .classes
            .iter_mut()
            .find(|c| c.class_id == class.id)
            .ok_or_else(|| ApiError::not_found("ClassEntry", class_slug))?;
        entry.level = entry.level.saturating_add(1);
        let class_level = entry.level;
        let new_level = previous_level.saturating_add(1);
        record.snapshot.level = new_level;

        let asi_pending = class_level % 4 == 0;
        record.snapshot.pending_level_up = Some(PendingLevelUp {
            class_slug: class_slug.to_string(),
            hp_choice_pending: true,
            asi_pending,
        });

        let features_gained = match class.subclass_level {
            Some(level) if level == class_level => vec![format!("{} Subclass", class.name)],
            _ => Vec::new(),
        };
        Ok(LevelUpResult {
            previous_level,
            new_level,
            hp_increase: None,
            features_gained,
            spell_slots: class
                .progression_at(class_level)
                .map(|p| p.spell_slots.clone())
                .unwrap_or_default(),
            asi_pending,
            hp_choice_pending: true,
        })
    }

    async fn choose_hp(
        &self,
        id: CharacterId,
        class_slug: &str,
        method: HpMethod,
    ) -> Result<i32, ApiError> {
        self.enter("choose_hp", method.as_str()).await?;
        let mut state = self.state.write().await;
        let hit_die = state.class_by_slug(class_slug)?.hit_die.max(1);
        let record = state.record_mut(id)?;
        let con = record
            .snapshot
            .abilities
            .map(|s| s.modifier(Ability::Constitution))
            .unwrap_or(0);

        let pending = record
            .snapshot
            .pending_level_up
            .as_mut()
            .filter(|p| p.class_slug == class_slug && p.hp_choice_pending)
            .ok_or_else(|| {
                ApiError::status(
                    format!("/characters/{}/classes/{}/hp-choice", id, class_slug),
                    409,
                    "no hit point choice pending",
                )
            })?;
        pending.hp_choice_pending = false;

        let die_result = match method {
            HpMethod::Average => i32::from(hit_die / 2 + 1),
            HpMethod::Roll => i32::from(rand::thread_rng().gen_range(1..=hit_die)),
        };
        state.clear_finished_level_up(id)?;
        Ok((die_result + con).max(1))
    }
}

#[async_trait]
impl CompendiumApi for InMemoryBackend {
    async fn race(&self, id: RaceId) -> Result<RaceRef, ApiError> {
        self.enter("race", id).await?;
        self.state
            .read()
            .await
            .races
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Race", id))
    }

    async fn class(&self, id: ClassId) -> Result<ClassRef, ApiError> {
        self.enter("class", id).await?;
        self.state
            .read()
            .await
            .classes
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Class", id))
    }

    async fn background(&self, id: BackgroundId) -> Result<BackgroundRef, ApiError> {
        self.enter("background", id).await?;
        self.state
            .read()
            .await
            .backgrounds
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("Background", id))
    }
}
