//! Character creation wizard.
//!
//! One session per draft. The step list is re-derived from the draft and
//! the pending choices on every read, the cursor is a step identifier, and
//! every save goes through [`SyncProtocol`]. The state mutex is never held
//! across a backend call; the save lock covers the whole confirm.

mod error;

pub use error::WizardError;

use std::sync::Arc;

use charwright_domain::steps::choices_for_step;
use charwright_domain::{
    creation_steps, effective_equipment_selection, evaluate, evaluate_equipment,
    persisted_equipment_selections,
    AbilityScoreMethod, AbilityScores, BackgroundId, CharacterId, CharacterName, CharacterPatch,
    CharacterSnapshot, CharacterStats, CharacterStatus, ChoiceKey, ClassEntry, ClassId,
    CreationStep, DomainError, DraftCharacter, DraftReferences, EquipmentEntry, EquipmentLedger,
    EquipmentRow, ItemId, LoadStatus, OptionId, PendingChoice, RaceId, SelectionLedger, SpellRow,
    StepCompletion, StepPlan, SubraceId,
};
use tokio::sync::Mutex;

use crate::infrastructure::ports::{ApiError, CharacterApi, CompendiumApi};
use crate::infrastructure::retry::RetryConfig;
use crate::stores::SaveLock;
use crate::use_cases::choices::{
    equipment_submissions, plain_submissions, spell_ids_after, FetchPendingChoices,
    PendingChoiceList,
};
use crate::use_cases::step_error::StepError;
use crate::use_cases::sync::SyncProtocol;

#[derive(Debug)]
struct WizardState {
    draft: DraftCharacter,
    pending: PendingChoiceList,
    ledger: SelectionLedger,
    equipment: EquipmentLedger,
    current: CreationStep,
    step_error: Option<StepError<CreationStep>>,
    stats: Option<CharacterStats>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            draft: DraftCharacter::new(),
            pending: PendingChoiceList::new(),
            ledger: SelectionLedger::new(),
            equipment: EquipmentLedger::new(),
            current: CreationStep::Name,
            step_error: None,
            stats: None,
        }
    }
}

impl WizardState {
    fn plan(&self) -> StepPlan {
        StepPlan::new(creation_steps(&self.draft, self.pending.choices()))
    }

    fn current(&self) -> CreationStep {
        self.plan().settle(self.current)
    }

    fn choices(&self, step: CreationStep) -> Vec<PendingChoice> {
        choices_for_step(step, &self.draft, self.pending.choices())
    }

    fn completion(&self, step: CreationStep) -> StepCompletion {
        let choices = self.choices(step);
        if step == CreationStep::Equipment {
            evaluate_equipment(&choices, &self.equipment, &self.draft.equipment)
        } else {
            evaluate(&choices, &self.ledger)
        }
    }

    fn is_complete(&self, step: CreationStep) -> bool {
        let draft = &self.draft;
        match step {
            CreationStep::Name => draft.name.is_some() && draft.id.is_some(),
            CreationStep::Race => draft.race.is_some(),
            CreationStep::Subrace => draft.subrace.is_some(),
            CreationStep::Class => draft.class.is_some() && draft.primary_class().is_some(),
            CreationStep::Abilities => draft.abilities_confirmed,
            CreationStep::Background => draft.background.is_some(),
            CreationStep::ProficiencyChoices
            | CreationStep::Feat
            | CreationStep::Equipment
            | CreationStep::Spells => self.completion(step).is_complete(),
            CreationStep::Review => draft.finalized,
        }
    }

    /// Local input the step needs before it can be saved.
    fn can_confirm(&self, step: CreationStep) -> bool {
        match step {
            CreationStep::Name => self.draft.name.is_some(),
            CreationStep::Review => true,
            other => self.is_complete(other),
        }
    }

    fn first_incomplete(&self) -> CreationStep {
        let plan = self.plan();
        plan.steps()
            .iter()
            .copied()
            .find(|step| !self.is_complete(*step))
            .unwrap_or(CreationStep::Review)
    }

    fn clear_ledgers(&mut self) {
        self.ledger.clear();
        self.equipment.clear();
    }

    fn move_to(&mut self, step: CreationStep) {
        if step != self.current {
            self.clear_ledgers();
        }
        self.current = step;
        self.step_error = None;
    }

    fn apply(&mut self, saved: Saved) {
        if let Some(snapshot) = saved.created {
            self.draft.id = Some(snapshot.id);
            self.draft.public_id = snapshot.public_id;
        }
        if let Some(classes) = saved.classes {
            self.draft.classes = classes;
        }
        if let Some(pending) = saved.pending {
            self.pending.replace(pending);
        }
        if let Some(rows) = saved.equipment {
            self.draft.equipment = rows;
        }
        if let Some(rows) = saved.spells {
            self.draft.spells = rows;
        }
        if saved.stats.is_some() {
            self.stats = saved.stats;
        }
        if saved.finalized {
            self.draft.finalized = true;
        }
    }
}

/// Everything a save needs, copied out of the state so the lock is free
/// while the backend is called.
struct ConfirmInput {
    step: CreationStep,
    draft: DraftCharacter,
    choices: Vec<PendingChoice>,
    ledger: SelectionLedger,
    equipment: EquipmentLedger,
}

/// What a save learned from the backend. Applied even when the save
/// failed part-way, so re-fetched data is never thrown away.
#[derive(Debug, Default)]
struct Saved {
    created: Option<CharacterSnapshot>,
    classes: Option<Vec<ClassEntry>>,
    pending: Option<Vec<PendingChoice>>,
    equipment: Option<Vec<EquipmentRow>>,
    spells: Option<Vec<SpellRow>>,
    stats: Option<CharacterStats>,
    finalized: bool,
}

/// The creation wizard session.
pub struct CreationWizard {
    characters: Arc<dyn CharacterApi>,
    compendium: Arc<dyn CompendiumApi>,
    fetch: FetchPendingChoices,
    sync: SyncProtocol,
    save_lock: SaveLock,
    state: Mutex<WizardState>,
}

impl CreationWizard {
    pub fn new(
        characters: Arc<dyn CharacterApi>,
        compendium: Arc<dyn CompendiumApi>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            fetch: FetchPendingChoices::new(characters.clone()),
            sync: SyncProtocol::new(characters.clone(), retry),
            characters,
            compendium,
            save_lock: SaveLock::new(),
            state: Mutex::new(WizardState::default()),
        }
    }

    /// Populate the wizard from an existing draft and jump to its first
    /// incomplete step.
    ///
    /// # Errors
    ///
    /// A character above level 1 is a validation error; the load is
    /// aborted and the draft's status records the failure.
    pub async fn load(&self, id: CharacterId) -> Result<CreationStep, WizardError> {
        {
            let mut state = self.state.lock().await;
            *state = WizardState::default();
            state.draft.status = LoadStatus::Loading;
        }

        match self.fetch_draft(id).await {
            Ok((draft, pending, stats)) => {
                let mut state = self.state.lock().await;
                state.draft = draft;
                state.pending.replace(pending);
                state.stats = stats;
                let step = state.first_incomplete();
                state.current = step;
                tracing::info!(character_id = %id, step = %step, "Draft loaded");
                Ok(step)
            }
            Err(e) => {
                tracing::warn!(character_id = %id, error = %e, "Draft load aborted");
                self.state.lock().await.draft.status = LoadStatus::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch_draft(
        &self,
        id: CharacterId,
    ) -> Result<(DraftCharacter, Vec<PendingChoice>, Option<CharacterStats>), WizardError> {
        let snapshot = self.characters.get_character(id).await?;

        let race = match snapshot.race_id {
            Some(race_id) => Some(self.compendium.race(race_id).await?),
            None => None,
        };
        let class = match snapshot.primary_class().map(|c| c.class_id) {
            Some(class_id) => Some(self.compendium.class(class_id).await?),
            None => None,
        };
        let background = match snapshot.background_id {
            Some(background_id) => Some(self.compendium.background(background_id).await?),
            None => None,
        };

        let mut draft = DraftCharacter::from_snapshot(
            snapshot,
            DraftReferences {
                race,
                class,
                background,
            },
        )?;
        draft.equipment = self.characters.list_equipment(id).await?;
        draft.spells = self.characters.list_spells(id).await?;

        let pending = self.fetch.execute(id).await?;
        let stats = self.refresh_stats(id).await;
        Ok((draft, pending, stats))
    }

    pub async fn set_name(&self, name: &str) -> Result<(), WizardError> {
        let name = CharacterName::new(name)?;
        self.state.lock().await.draft.set_name(name);
        Ok(())
    }

    /// Returns `true` if the race changed.
    pub async fn select_race(&self, race_id: RaceId) -> Result<bool, WizardError> {
        let race = self.compendium.race(race_id).await?;
        let mut state = self.state.lock().await;
        let changed = state.draft.select_race(race);
        if changed {
            tracing::debug!(race_id = %race_id, "Race changed, subrace cleared");
        }
        Ok(changed)
    }

    pub async fn select_subrace(&self, subrace_id: SubraceId) -> Result<(), WizardError> {
        self.state.lock().await.draft.select_subrace(subrace_id)?;
        Ok(())
    }

    /// Returns `true` if the class changed.
    pub async fn select_class(&self, class_id: ClassId) -> Result<bool, WizardError> {
        let class = self.compendium.class(class_id).await?;
        Ok(self.state.lock().await.draft.select_class(class))
    }

    pub async fn select_background(&self, background_id: BackgroundId) -> Result<(), WizardError> {
        let background = self.compendium.background(background_id).await?;
        self.state.lock().await.draft.select_background(background);
        Ok(())
    }

    pub async fn set_abilities(
        &self,
        scores: AbilityScores,
        method: AbilityScoreMethod,
    ) -> Result<(), WizardError> {
        self.state.lock().await.draft.set_abilities(scores, method)?;
        Ok(())
    }

    /// Toggle an option of a choice on the current step. Single-pick
    /// choices switch to the new option. Returns whether the picks changed.
    pub async fn toggle(&self, key: &ChoiceKey, option: OptionId) -> Result<bool, WizardError> {
        let mut state = self.state.lock().await;
        let step = state.current();
        let choice = state
            .choices(step)
            .into_iter()
            .find(|c| &c.key == key)
            .ok_or_else(|| WizardError::UnknownChoice(key.to_string()))?;

        state.ledger.seed(&choice);
        let already = state
            .ledger
            .get(key)
            .is_some_and(|s| s.contains(&option));
        let changed = if choice.quantity == 1 && !already {
            state.ledger.select_only(&choice, option)
        } else {
            state.ledger.toggle(&choice, option)
        };
        Ok(changed)
    }

    /// Pick a bundle for an equipment choice. Switching bundles drops the
    /// item picks made under the old one.
    pub async fn select_equipment(
        &self,
        key: &ChoiceKey,
        option: OptionId,
    ) -> Result<bool, WizardError> {
        let mut state = self.state.lock().await;
        let choice = state
            .choices(CreationStep::Equipment)
            .into_iter()
            .find(|c| &c.key == key)
            .ok_or_else(|| WizardError::UnknownChoice(key.to_string()))?;
        if choice.options.bundle(&option).is_none() {
            return Err(DomainError::validation(format!(
                "{} is not an option of {}",
                option, key
            ))
            .into());
        }
        Ok(state.equipment.select_option(key, option))
    }

    /// Pick the concrete item for a category slot of the chosen bundle.
    pub async fn pick_equipment_item(
        &self,
        key: &ChoiceKey,
        item_index: usize,
        item_id: ItemId,
    ) -> Result<(), WizardError> {
        let mut state = self.state.lock().await;
        let choice = state
            .choices(CreationStep::Equipment)
            .into_iter()
            .find(|c| &c.key == key)
            .ok_or_else(|| WizardError::UnknownChoice(key.to_string()))?;
        let option = state
            .equipment
            .get(key)
            .map(|s| s.option.clone())
            .ok_or_else(|| DomainError::validation("Choose an equipment option first"))?;
        let is_slot = choice
            .options
            .bundle(&option)
            .is_some_and(|b| b.category_slots().any(|i| i == item_index));
        if !is_slot {
            return Err(DomainError::validation(format!(
                "Item {} of option {} is not a choosable slot",
                item_index, option
            ))
            .into());
        }
        state.equipment.pick_item(key, item_index, item_id)?;
        Ok(())
    }

    /// Save the current step and advance. Returns the step the wizard is on
    /// afterwards.
    ///
    /// # Errors
    ///
    /// `SaveInFlight` when another confirm is running, `StepIncomplete`
    /// when local input is missing. Backend failures keep the step and its
    /// picks and are also recorded as the step's error.
    pub async fn confirm(&self) -> Result<CreationStep, WizardError> {
        let Some(_guard) = self.save_lock.try_acquire() else {
            tracing::debug!("Confirm ignored, a save is in flight");
            return Err(WizardError::SaveInFlight);
        };

        let input = {
            let state = self.state.lock().await;
            let step = state.current();
            if !state.can_confirm(step) {
                return Err(WizardError::StepIncomplete(step));
            }
            ConfirmInput {
                step,
                draft: state.draft.clone(),
                choices: state.choices(step),
                ledger: state.ledger.clone(),
                equipment: state.equipment.clone(),
            }
        };
        let step = input.step;

        let mut saved = Saved::default();
        let result = self.persist(&input, &mut saved).await;

        let mut state = self.state.lock().await;
        state.apply(saved);
        match result {
            Ok(()) => {
                state.clear_ledgers();
                state.step_error = None;
                let plan = state.plan();
                let next = plan.next(step).unwrap_or(step);
                state.current = next;
                tracing::info!(step = %step, next = %next, "Step confirmed");
                Ok(next)
            }
            Err(e) => {
                state.current = step;
                // The review step records its own message.
                let recorded = state.step_error.take();
                let step_error = match &e {
                    WizardError::Api(api) => StepError::network(step, api),
                    WizardError::StepIncomplete(_) => {
                        recorded.unwrap_or_else(|| StepError::validation(step, e.to_string()))
                    }
                    other => StepError::validation(step, other.to_string()),
                };
                state.step_error = Some(step_error);
                tracing::warn!(step = %step, error = %e, "Step save failed");
                Err(e)
            }
        }
    }

    async fn persist(&self, input: &ConfirmInput, saved: &mut Saved) -> Result<(), WizardError> {
        let draft = &input.draft;

        if input.step == CreationStep::Name {
            let name = draft
                .name
                .as_ref()
                .ok_or_else(|| DomainError::validation("Enter a name"))?;
            match draft.id {
                None => {
                    let snapshot = self.characters.create_character(name.as_str()).await?;
                    tracing::info!(character_id = %snapshot.id, "Draft character created");
                    saved.created = Some(snapshot);
                }
                Some(id) => {
                    let patch = CharacterPatch {
                        name: Some(name.as_str().to_string()),
                        ..CharacterPatch::default()
                    };
                    self.sync.patch(id, &patch).await?;
                }
            }
            return Ok(());
        }

        let id = draft.id.ok_or(WizardError::NoCharacter)?;
        match input.step {
            CreationStep::Name => Ok(()),
            CreationStep::Race => {
                let race = draft
                    .race
                    .as_ref()
                    .ok_or_else(|| DomainError::validation("Select a race"))?;
                let patch = CharacterPatch {
                    race_id: Some(race.id),
                    subrace_id: Some(draft.subrace),
                    ..CharacterPatch::default()
                };
                self.sync.patch(id, &patch).await?;
                saved.pending = Some(self.fetch.execute(id).await?);
                saved.stats = self.refresh_stats(id).await;
                Ok(())
            }
            CreationStep::Subrace => {
                let patch = CharacterPatch {
                    subrace_id: Some(draft.subrace),
                    ..CharacterPatch::default()
                };
                self.sync.patch(id, &patch).await?;
                saved.pending = Some(self.fetch.execute(id).await?);
                saved.stats = self.refresh_stats(id).await;
                Ok(())
            }
            CreationStep::Class => {
                let class = draft
                    .class
                    .as_ref()
                    .ok_or_else(|| DomainError::validation("Select a class"))?;
                let entry = self.sync.assign_class(id, class.id).await?;
                saved.classes = Some(vec![entry]);
                saved.pending = Some(self.fetch.execute(id).await?);
                saved.stats = self.refresh_stats(id).await;
                Ok(())
            }
            CreationStep::Abilities => {
                let patch = CharacterPatch {
                    abilities: Some(draft.abilities),
                    ability_method: Some(draft.ability_method),
                    ..CharacterPatch::default()
                };
                self.sync.patch(id, &patch).await?;
                saved.stats = self.refresh_stats(id).await;
                Ok(())
            }
            CreationStep::Background => {
                let background = draft
                    .background
                    .as_ref()
                    .ok_or_else(|| DomainError::validation("Select a background"))?;
                let patch = CharacterPatch {
                    background_id: Some(background.id),
                    ..CharacterPatch::default()
                };
                self.sync.patch(id, &patch).await?;
                saved.pending = Some(self.fetch.execute(id).await?);
                Ok(())
            }
            CreationStep::ProficiencyChoices | CreationStep::Feat => {
                self.resolve(id, input, saved).await
            }
            CreationStep::Equipment => self.save_equipment(id, input, saved).await,
            CreationStep::Spells => self.save_spells(id, input, saved).await,
            CreationStep::Review => self.finalize(id, saved).await,
        }
    }

    async fn resolve(
        &self,
        id: CharacterId,
        input: &ConfirmInput,
        saved: &mut Saved,
    ) -> Result<(), WizardError> {
        let submissions = plain_submissions(&input.choices, &input.ledger);
        if submissions.is_empty() {
            return Ok(());
        }
        let outcome = self.sync.resolve_choices(id, &submissions).await;
        match outcome.pending {
            Ok(pending) => saved.pending = Some(pending),
            Err(e) if outcome.error.is_none() => return Err(e.into()),
            Err(_) => {}
        }
        match outcome.error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Once any equipment group is edited the whole collection is rewritten
    /// from every group's effective selection, so untouched groups keep
    /// their items.
    async fn save_equipment(
        &self,
        id: CharacterId,
        input: &ConfirmInput,
        saved: &mut Saved,
    ) -> Result<(), WizardError> {
        if !input.equipment.any_dirty() {
            return Ok(());
        }

        let persisted = persisted_equipment_selections(&input.choices, &input.draft.equipment);
        let mut entries: Vec<EquipmentEntry> = Vec::new();
        for choice in &input.choices {
            let Some(selection) =
                effective_equipment_selection(choice, &input.equipment, &persisted)
            else {
                continue;
            };
            let bundle = choice.options.bundle(&selection.option).ok_or_else(|| {
                DomainError::validation(format!(
                    "{} is not an option of {}",
                    selection.option, choice.key
                ))
            })?;
            entries.extend(selection.resolve(bundle)?);
        }

        let submissions = equipment_submissions(&input.choices, &input.equipment);
        let outcome = self.sync.resolve_choices(id, &submissions).await;
        if let Ok(pending) = outcome.pending {
            saved.pending = Some(pending);
        }
        if let Some(e) = outcome.error {
            return Err(e.into());
        }

        let replaced = self.sync.replace_equipment(id, &entries).await;
        saved.equipment = replaced.persisted;
        replaced.result?;
        tracing::info!(character_id = %id, rows = entries.len(), "Equipment saved");
        Ok(())
    }

    /// Spell rows behind a touched spell choice are replaced by its new
    /// picks; rows from other sources stay.
    async fn save_spells(
        &self,
        id: CharacterId,
        input: &ConfirmInput,
        saved: &mut Saved,
    ) -> Result<(), WizardError> {
        let submissions = plain_submissions(&input.choices, &input.ledger);
        if submissions.is_empty() {
            return Ok(());
        }

        let spells = spell_ids_after(
            &input.draft.spells,
            &input.choices,
            &input.ledger,
            &submissions,
        );

        let outcome = self.sync.resolve_choices(id, &submissions).await;
        if let Ok(pending) = outcome.pending {
            saved.pending = Some(pending);
        }
        if let Some(e) = outcome.error {
            return Err(e.into());
        }

        let replaced = self.sync.replace_spells(id, &spells).await;
        saved.spells = replaced.persisted;
        replaced.result?;
        Ok(())
    }

    async fn finalize(&self, id: CharacterId, saved: &mut Saved) -> Result<(), WizardError> {
        let report = self.characters.validation(id).await?;
        if !report.is_complete {
            let message = if report.missing.is_empty() {
                "Character is not complete".to_string()
            } else {
                format!("Missing: {}", report.missing.join(", "))
            };
            tracing::info!(character_id = %id, missing = ?report.missing, "Draft not complete");
            self.state.lock().await.step_error =
                Some(StepError::validation(CreationStep::Review, message));
            return Err(WizardError::StepIncomplete(CreationStep::Review));
        }

        let patch = CharacterPatch {
            status: Some(CharacterStatus::Active),
            ..CharacterPatch::default()
        };
        self.sync.patch(id, &patch).await?;
        saved.finalized = true;
        tracing::info!(character_id = %id, "Character finalized");
        Ok(())
    }

    async fn refresh_stats(&self, id: CharacterId) -> Option<CharacterStats> {
        match self.characters.stats(id).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::warn!(character_id = %id, error = %e, "Failed to refresh stats");
                None
            }
        }
    }

    /// Previous step, if any. Already-saved answers are not rolled back.
    pub async fn go_back(&self) -> CreationStep {
        let mut state = self.state.lock().await;
        let plan = state.plan();
        let current = state.current();
        let previous = plan.previous(current).unwrap_or(current);
        state.move_to(previous);
        previous
    }

    /// Jump to `step`, which must be at or before the first incomplete step.
    pub async fn go_to(&self, step: CreationStep) -> Result<(), WizardError> {
        let mut state = self.state.lock().await;
        let plan = state.plan();
        let target = plan.index_of(step).ok_or(WizardError::WrongStep(step))?;
        let limit = plan.index_of(state.first_incomplete()).unwrap_or(plan.len());
        if target > limit {
            return Err(WizardError::WrongStep(step));
        }
        state.move_to(step);
        Ok(())
    }

    /// Discard all local state. The remote draft is left alone.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        if let Some(id) = state.draft.id {
            tracing::info!(character_id = %id, "Wizard reset, remote draft kept");
        }
        *state = WizardState::default();
    }

    pub async fn current_step(&self) -> CreationStep {
        self.state.lock().await.current()
    }

    pub async fn steps(&self) -> Vec<CreationStep> {
        self.state.lock().await.plan().steps().to_vec()
    }

    /// One-based position of the current step and the step count.
    pub async fn progress(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        state.plan().progress(state.current)
    }

    pub async fn step_choices(&self) -> Vec<PendingChoice> {
        let state = self.state.lock().await;
        state.choices(state.current())
    }

    pub async fn step_completion(&self) -> StepCompletion {
        let state = self.state.lock().await;
        state.completion(state.current())
    }

    pub async fn can_continue(&self) -> bool {
        let state = self.state.lock().await;
        state.can_confirm(state.current()) && !self.save_lock.is_locked()
    }

    pub async fn step_error(&self) -> Option<StepError<CreationStep>> {
        self.state.lock().await.step_error.clone()
    }

    pub async fn dismiss_error(&self) {
        self.state.lock().await.step_error = None;
    }

    pub async fn draft(&self) -> DraftCharacter {
        self.state.lock().await.draft.clone()
    }

    pub async fn pending_choices(&self) -> Vec<PendingChoice> {
        self.state.lock().await.pending.choices().to_vec()
    }

    pub async fn stats(&self) -> Option<CharacterStats> {
        self.state.lock().await.stats.clone()
    }

    /// Re-fetch the pending list. A failure keeps the previous list and is
    /// recorded against the current step.
    pub async fn refresh_choices(&self) -> Result<(), WizardError> {
        let id = self
            .state
            .lock()
            .await
            .draft
            .id
            .ok_or(WizardError::NoCharacter)?;
        match self.fetch.execute(id).await {
            Ok(pending) => {
                self.state.lock().await.pending.replace(pending);
                Ok(())
            }
            Err(e) => {
                let mut state = self.state.lock().await;
                let step = state.current();
                state.step_error = Some(StepError::network(step, &e));
                Err(e.into())
            }
        }
    }

    /// Removal of the remote draft, for callers that own its lifecycle.
    pub async fn delete_remote(&self, id: CharacterId) -> Result<(), ApiError> {
        self.characters.delete_character(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{MockCharacterApi, MockCompendiumApi};
    use crate::test_fixtures::{
        classes, creation_wizard, demo_backend, keys, no_retry, races, seeded_fighter,
        standard_array,
    };
    use crate::use_cases::step_error::StepErrorKind;
    use mockall::predicate::*;

    /// Name, race and class confirmed for a fresh character.
    async fn through_class(wizard: &CreationWizard, race: i64, class: i64) {
        wizard.set_name("Thorin").await.unwrap();
        wizard.confirm().await.unwrap();
        wizard.select_race(RaceId::new(race)).await.unwrap();
        wizard.confirm().await.unwrap();
        wizard.select_class(ClassId::new(class)).await.unwrap();
        wizard.confirm().await.unwrap();
    }

    /// Continue from abilities up to the equipment step of a dwarf fighter.
    async fn to_equipment(wizard: &CreationWizard) {
        let (scores, method) = standard_array();
        wizard.set_abilities(scores, method).await.unwrap();
        assert_eq!(wizard.confirm().await.unwrap(), CreationStep::Background);
        wizard.select_background(BackgroundId::new(3)).await.unwrap();
        assert_eq!(
            wizard.confirm().await.unwrap(),
            CreationStep::ProficiencyChoices
        );

        for option in ["athletics", "history"] {
            wizard
                .toggle(&keys::fighter_skills(), OptionId::from(option))
                .await
                .unwrap();
        }
        for option in ["dwarvish", "elvish"] {
            wizard
                .toggle(&keys::acolyte_languages(), OptionId::from(option))
                .await
                .unwrap();
        }
        assert_eq!(wizard.confirm().await.unwrap(), CreationStep::Equipment);
    }

    fn maces(rows: &[EquipmentRow]) -> usize {
        rows.iter()
            .filter(|r| {
                r.entry
                    == EquipmentEntry::Catalog {
                        item_id: ItemId::new(101),
                        quantity: 1,
                    }
            })
            .count()
    }

    #[tokio::test]
    async fn thorin_keeps_exactly_one_mace_across_repeated_confirms() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);
        through_class(&wizard, 1, 5).await;
        assert_eq!(wizard.current_step().await, CreationStep::Abilities);
        to_equipment(&wizard).await;

        wizard
            .select_equipment(&keys::fighter_weapons(), OptionId::from("a"))
            .await
            .unwrap();
        assert_eq!(wizard.confirm().await.unwrap(), CreationStep::Review);

        // Confirm again without touching anything.
        wizard.go_to(CreationStep::Equipment).await.unwrap();
        assert_eq!(wizard.confirm().await.unwrap(), CreationStep::Review);

        // Pick the same bundle again and save it once more.
        wizard.go_to(CreationStep::Equipment).await.unwrap();
        wizard
            .select_equipment(&keys::fighter_weapons(), OptionId::from("a"))
            .await
            .unwrap();
        wizard.confirm().await.unwrap();

        let id = wizard.draft().await.id.unwrap();
        let rows = backend.list_equipment(id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(maces(&rows), 1);

        // Reload into a fresh session.
        let reloaded = creation_wizard(&backend);
        reloaded.load(id).await.unwrap();
        let draft = reloaded.draft().await;
        assert_eq!(draft.equipment.len(), 1);
        assert_eq!(maces(&draft.equipment), 1);
    }

    #[tokio::test]
    async fn review_finalizes_a_complete_draft() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);
        through_class(&wizard, 1, 5).await;
        to_equipment(&wizard).await;
        wizard
            .select_equipment(&keys::fighter_weapons(), OptionId::from("b"))
            .await
            .unwrap();
        wizard.confirm().await.unwrap();

        assert_eq!(wizard.confirm().await.unwrap(), CreationStep::Review);
        let draft = wizard.draft().await;
        assert!(draft.finalized);
        let snapshot = backend.get_character(draft.id.unwrap()).await.unwrap();
        assert_eq!(snapshot.status, CharacterStatus::Active);
    }

    #[tokio::test]
    async fn review_reports_missing_items() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);
        through_class(&wizard, 1, 5).await;
        let (scores, method) = standard_array();
        wizard.set_abilities(scores, method).await.unwrap();
        wizard.confirm().await.unwrap();

        // Skip ahead as far as navigation allows, then force the review.
        let id = wizard.draft().await.id.unwrap();
        let report = backend.validation(id).await.unwrap();
        assert!(!report.is_complete);

        let mut state = wizard.state.lock().await;
        state.current = CreationStep::Review;
        drop(state);

        let err = wizard.confirm().await.unwrap_err();
        assert!(matches!(err, WizardError::StepIncomplete(CreationStep::Review)));
        let step_error = wizard.step_error().await.unwrap();
        assert_eq!(step_error.kind, StepErrorKind::Validation);
        assert!(step_error.message.contains("background"));
        assert!(!wizard.draft().await.finalized);
    }

    #[tokio::test]
    async fn concurrent_confirm_is_rejected_without_a_second_request() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);
        wizard.set_name("Thorin").await.unwrap();
        wizard.confirm().await.unwrap();
        wizard.select_race(RaceId::new(1)).await.unwrap();
        backend.clear_calls().await;

        let (first, second) = tokio::join!(wizard.confirm(), wizard.confirm());

        assert_eq!(first.unwrap(), CreationStep::Class);
        assert!(matches!(second, Err(WizardError::SaveInFlight)));
        let patches = backend
            .calls()
            .await
            .into_iter()
            .filter(|c| c.starts_with("update_character"))
            .count();
        assert_eq!(patches, 1);
    }

    #[tokio::test]
    async fn subraced_race_adds_exactly_one_step() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);

        wizard.select_race(RaceId::new(1)).await.unwrap();
        let dwarf = wizard.steps().await;
        wizard.select_race(RaceId::new(2)).await.unwrap();
        let elf = wizard.steps().await;

        assert_eq!(elf.len(), dwarf.len() + 1);
        assert!(elf.contains(&CreationStep::Subrace));
        assert!(!dwarf.contains(&CreationStep::Subrace));
        let race = elf.iter().position(|s| *s == CreationStep::Race).unwrap();
        assert_eq!(elf[race + 1], CreationStep::Subrace);
    }

    #[tokio::test]
    async fn switching_race_moves_cursor_off_a_vanished_subrace_step() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);
        wizard.set_name("Arwen").await.unwrap();
        wizard.confirm().await.unwrap();
        wizard.select_race(RaceId::new(2)).await.unwrap();
        assert_eq!(wizard.confirm().await.unwrap(), CreationStep::Subrace);

        wizard.select_race(RaceId::new(1)).await.unwrap();
        assert_eq!(wizard.current_step().await, CreationStep::Race);
    }

    #[tokio::test]
    async fn subrace_is_saved_with_its_own_patch() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);
        wizard.set_name("Arwen").await.unwrap();
        wizard.confirm().await.unwrap();
        wizard.select_race(RaceId::new(2)).await.unwrap();
        wizard.confirm().await.unwrap();

        assert!(wizard.select_subrace(SubraceId::new(99)).await.is_err());
        assert!(!wizard.can_continue().await);
        wizard.select_subrace(SubraceId::new(22)).await.unwrap();
        assert_eq!(wizard.confirm().await.unwrap(), CreationStep::Class);

        let id = wizard.draft().await.id.unwrap();
        let snapshot = backend.get_character(id).await.unwrap();
        assert_eq!(snapshot.subrace_id, Some(SubraceId::new(22)));
    }

    #[tokio::test]
    async fn wizard_class_gets_a_spell_step_and_saves_cantrips() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);
        through_class(&wizard, 1, 12).await;
        assert!(wizard.steps().await.contains(&CreationStep::Spells));

        let (scores, method) = standard_array();
        wizard.set_abilities(scores, method).await.unwrap();
        wizard.confirm().await.unwrap();
        wizard.select_background(BackgroundId::new(3)).await.unwrap();
        wizard.confirm().await.unwrap();
        for option in ["giant", "orc"] {
            wizard
                .toggle(&keys::acolyte_languages(), OptionId::from(option))
                .await
                .unwrap();
        }
        assert_eq!(wizard.confirm().await.unwrap(), CreationStep::Equipment);
        assert_eq!(wizard.confirm().await.unwrap(), CreationStep::Spells);

        for option in ["201", "202", "203", "204"] {
            wizard
                .toggle(&keys::wizard_cantrips(), OptionId::from(option))
                .await
                .unwrap();
        }
        // The fourth pick is beyond the quantity and ignored.
        let completion = wizard.step_completion().await;
        assert!(completion.is_complete());
        assert_eq!(wizard.confirm().await.unwrap(), CreationStep::Review);

        let spells = wizard.draft().await.spells;
        let mut ids: Vec<i64> = spells.iter().map(|s| s.spell_id.get()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![201, 202, 203]);
    }

    #[tokio::test]
    async fn network_failure_keeps_picks_and_sets_step_error() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);
        through_class(&wizard, 1, 5).await;
        to_equipment(&wizard).await;
        wizard
            .select_equipment(&keys::fighter_weapons(), OptionId::from("a"))
            .await
            .unwrap();

        backend
            .fail_next("add_equipment", ApiError::network("/equipment", "connection reset"))
            .await;
        let err = wizard.confirm().await.unwrap_err();
        assert!(matches!(err, WizardError::Api(ApiError::Network { .. })));
        assert_eq!(wizard.current_step().await, CreationStep::Equipment);

        let step_error = wizard.step_error().await.unwrap();
        assert!(step_error.is_retryable());
        // The bundle pick survived and the persisted (empty) rows were re-read.
        assert!(wizard.step_completion().await.is_complete());
        assert!(wizard.draft().await.equipment.is_empty());

        assert_eq!(wizard.confirm().await.unwrap(), CreationStep::Review);
        assert!(wizard.step_error().await.is_none());
        assert_eq!(maces(&wizard.draft().await.equipment), 1);
    }

    #[tokio::test]
    async fn confirm_is_blocked_until_choices_are_complete() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);
        through_class(&wizard, 1, 5).await;
        let (scores, method) = standard_array();
        wizard.set_abilities(scores, method).await.unwrap();
        wizard.confirm().await.unwrap();
        wizard.select_background(BackgroundId::new(3)).await.unwrap();
        wizard.confirm().await.unwrap();

        wizard
            .toggle(&keys::fighter_skills(), OptionId::from("athletics"))
            .await
            .unwrap();
        let err = wizard.confirm().await.unwrap_err();
        assert!(matches!(
            err,
            WizardError::StepIncomplete(CreationStep::ProficiencyChoices)
        ));
        let completion = wizard.step_completion().await;
        assert_eq!(completion.group(&keys::fighter_skills()), Some(false));
    }

    #[tokio::test]
    async fn go_to_cannot_skip_past_the_first_incomplete_step() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);
        through_class(&wizard, 1, 5).await;

        assert!(matches!(
            wizard.go_to(CreationStep::Equipment).await,
            Err(WizardError::WrongStep(CreationStep::Equipment))
        ));
        wizard.go_to(CreationStep::Race).await.unwrap();
        assert_eq!(wizard.current_step().await, CreationStep::Race);
        assert_eq!(wizard.go_back().await, CreationStep::Name);
        assert_eq!(wizard.progress().await.0, 1);
    }

    #[tokio::test]
    async fn reset_clears_local_state_only() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);
        through_class(&wizard, 1, 5).await;
        let id = wizard.draft().await.id.unwrap();

        wizard.reset().await;

        assert_eq!(wizard.draft().await, DraftCharacter::new());
        assert_eq!(wizard.current_step().await, CreationStep::Name);
        assert!(backend.get_character(id).await.is_ok());
    }

    #[tokio::test]
    async fn loading_a_higher_level_character_is_aborted() {
        let backend = demo_backend();
        let id = seeded_fighter(&backend, 70, 3).await;
        let wizard = creation_wizard(&backend);

        let err = wizard.load(id).await.unwrap_err();
        assert!(matches!(err, WizardError::Domain(DomainError::Validation(_))));
        assert!(matches!(wizard.draft().await.status, LoadStatus::Failed(_)));
    }

    #[tokio::test]
    async fn load_resumes_at_first_incomplete_step() {
        let backend = demo_backend();
        let id = seeded_fighter(&backend, 80, 1).await;
        let wizard = creation_wizard(&backend);

        let step = wizard.load(id).await.unwrap();
        assert_eq!(step, CreationStep::Background);
        assert!(wizard.stats().await.is_some());
    }

    #[tokio::test]
    async fn failed_pending_refresh_keeps_previous_choices() {
        let backend = demo_backend();
        let wizard = creation_wizard(&backend);
        through_class(&wizard, 1, 5).await;
        let before = wizard.pending_choices().await;
        assert!(!before.is_empty());

        backend
            .fail_next("pending_choices", ApiError::status("/pending-choices", 502, ""))
            .await;
        assert!(wizard.refresh_choices().await.is_err());
        assert_eq!(wizard.pending_choices().await, before);
        assert!(wizard.step_error().await.is_some());
    }

    #[tokio::test]
    async fn race_save_sends_cleared_subrace() {
        let mut characters = MockCharacterApi::new();
        let mut compendium = MockCompendiumApi::new();
        let id = CharacterId::new(9);

        characters
            .expect_create_character()
            .withf(|name| name == "Thorin")
            .returning(move |name| Ok(CharacterSnapshot::new(id, name)));
        characters
            .expect_update_character()
            .withf(move |got, patch| {
                *got == id && patch.race_id == Some(RaceId::new(1)) && patch.subrace_id == Some(None)
            })
            .times(1)
            .returning(|_, _| Ok(()));
        characters.expect_pending_choices().returning(|_| Ok(vec![]));
        characters
            .expect_stats()
            .returning(|_| Err(ApiError::status("/stats", 500, "")));
        compendium
            .expect_race()
            .with(eq(RaceId::new(1)))
            .returning(|_| Ok(races::dwarf()));

        let wizard = CreationWizard::new(Arc::new(characters), Arc::new(compendium), no_retry());
        wizard.set_name("Thorin").await.unwrap();
        wizard.confirm().await.unwrap();
        wizard.select_race(RaceId::new(1)).await.unwrap();

        // A stats failure is logged, not raised.
        assert_eq!(wizard.confirm().await.unwrap(), CreationStep::Class);
        assert!(wizard.stats().await.is_none());
    }

    #[tokio::test]
    async fn paladin_like_class_gets_no_spell_step() {
        let mut characters = MockCharacterApi::new();
        let mut compendium = MockCompendiumApi::new();
        characters.expect_create_character().never();
        compendium
            .expect_class()
            .with(eq(ClassId::new(7)))
            .returning(|_| Ok(classes::paladin()));
        compendium
            .expect_class()
            .with(eq(ClassId::new(12)))
            .returning(|_| Ok(classes::wizard()));

        let wizard = CreationWizard::new(Arc::new(characters), Arc::new(compendium), no_retry());
        wizard.select_class(ClassId::new(7)).await.unwrap();
        assert!(!wizard.steps().await.contains(&CreationStep::Spells));
        wizard.select_class(ClassId::new(12)).await.unwrap();
        assert!(wizard.steps().await.contains(&CreationStep::Spells));
    }
}
