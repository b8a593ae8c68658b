//! Level-up wizard.
//!
//! Same ledger, evaluator and sync protocol as creation, driven by the
//! level-up state machine. HP lives on the level-up record, not in the
//! pending list, and takes precedence on resume. Only choices granted at
//! the new level, or still unanswered, are part of the transition.

mod error;

pub use error::LevelUpError;

use std::sync::Arc;

use charwright_domain::level_up::choices_for_step;
use charwright_domain::{
    evaluate, CharacterId, CharacterStats, ChoiceKey, HpMethod, LevelUpProgress, LevelUpStep,
    OptionId, PendingChoice, SelectionLedger, SpellRow, StepCompletion,
};
use tokio::sync::Mutex;

use crate::infrastructure::ports::CharacterApi;
use crate::infrastructure::retry::RetryConfig;
use crate::stores::SaveLock;
use crate::use_cases::choices::{
    plain_submissions, spell_ids_after, FetchPendingChoices, PendingChoiceList,
};
use crate::use_cases::step_error::StepError;
use crate::use_cases::sync::SyncProtocol;

#[derive(Debug, Default)]
struct LevelUpState {
    character: Option<CharacterId>,
    progress: Option<LevelUpProgress>,
    pending: PendingChoiceList,
    ledger: SelectionLedger,
    step_error: Option<StepError<LevelUpStep>>,
    stats: Option<CharacterStats>,
    spells: Vec<SpellRow>,
}

impl LevelUpState {
    fn session(&self) -> Result<(CharacterId, &LevelUpProgress), LevelUpError> {
        match (self.character, self.progress.as_ref()) {
            (Some(id), Some(progress)) => Ok((id, progress)),
            _ => Err(LevelUpError::NotStarted),
        }
    }

    fn progress_mut(&mut self) -> Result<&mut LevelUpProgress, LevelUpError> {
        self.progress.as_mut().ok_or(LevelUpError::NotStarted)
    }

    fn current(&self) -> Option<LevelUpStep> {
        self.progress.as_ref().and_then(LevelUpProgress::current_step)
    }

    fn choices(&self, step: LevelUpStep) -> Vec<PendingChoice> {
        let Some(progress) = self.progress.as_ref() else {
            return Vec::new();
        };
        let relevant = progress.relevant(self.pending.choices());
        choices_for_step(&relevant, step).into_iter().cloned().collect()
    }

    /// Move to the first step with outstanding work.
    fn resume(&mut self) -> Result<LevelUpStep, LevelUpError> {
        let pending = self.pending.choices().to_vec();
        let progress = self.progress_mut()?;
        progress.sync_asi(&pending);
        let step = progress.resume_step(&pending);
        progress.enter(step)?;
        self.ledger.clear();
        Ok(step)
    }
}

/// The level-up wizard session.
pub struct LevelUpWizard {
    characters: Arc<dyn CharacterApi>,
    fetch: FetchPendingChoices,
    sync: SyncProtocol,
    save_lock: SaveLock,
    state: Mutex<LevelUpState>,
}

impl LevelUpWizard {
    pub fn new(characters: Arc<dyn CharacterApi>, retry: RetryConfig) -> Self {
        Self {
            fetch: FetchPendingChoices::new(characters.clone()),
            sync: SyncProtocol::new(characters.clone(), retry),
            characters,
            save_lock: SaveLock::new(),
            state: Mutex::new(LevelUpState::default()),
        }
    }

    /// Trigger a level-up in `class_slug` and open on the first step with
    /// work to do.
    pub async fn start(&self, id: CharacterId, class_slug: &str) -> Result<LevelUpStep, LevelUpError> {
        let _guard = self.save_lock.try_acquire().ok_or(LevelUpError::SaveInFlight)?;

        let result = self.characters.level_up(id, class_slug).await?;
        tracing::info!(
            character_id = %id,
            class = class_slug,
            previous_level = result.previous_level,
            new_level = result.new_level,
            hp_choice_pending = result.hp_choice_pending,
            asi_pending = result.asi_pending,
            "Level-up started"
        );
        let pending = self.fetch.execute(id).await?;

        let mut state = self.state.lock().await;
        *state = LevelUpState {
            character: Some(id),
            progress: Some(LevelUpProgress::from_result(class_slug, result)),
            ..LevelUpState::default()
        };
        state.pending.replace(pending);
        state.resume()
    }

    /// Reopen an interrupted level-up from the character record.
    pub async fn resume(&self, id: CharacterId) -> Result<LevelUpStep, LevelUpError> {
        let snapshot = self.characters.get_character(id).await?;
        let Some(pending_level_up) = snapshot.pending_level_up else {
            return Err(LevelUpError::NotStarted);
        };
        let pending = self.fetch.execute(id).await?;

        let mut state = self.state.lock().await;
        *state = LevelUpState {
            character: Some(id),
            progress: Some(LevelUpProgress::from_pending(&pending_level_up, snapshot.level)),
            ..LevelUpState::default()
        };
        state.pending.replace(pending);
        let step = state.resume()?;
        tracing::info!(character_id = %id, step = %step, "Level-up resumed");
        Ok(step)
    }

    /// Take the HP gain. Not retried: a second roll is a different answer.
    pub async fn choose_hp(&self, method: HpMethod) -> Result<i32, LevelUpError> {
        let _guard = self.save_lock.try_acquire().ok_or(LevelUpError::SaveInFlight)?;

        let (id, class_slug) = {
            let state = self.state.lock().await;
            let (id, progress) = state.session()?;
            if state.current() != Some(LevelUpStep::HitPoints) {
                return Err(LevelUpError::WrongStep(LevelUpStep::HitPoints));
            }
            (id, progress.class_slug.clone())
        };

        let hp = match self.characters.choose_hp(id, &class_slug, method).await {
            Ok(hp) => hp,
            Err(e) => {
                self.state.lock().await.step_error =
                    Some(StepError::network(LevelUpStep::HitPoints, &e));
                return Err(e.into());
            }
        };
        tracing::info!(character_id = %id, method = method.as_str(), hp, "Hit points chosen");
        let stats = match self.characters.stats(id).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::warn!(character_id = %id, error = %e, "Failed to refresh stats");
                None
            }
        };

        let mut state = self.state.lock().await;
        state.progress_mut()?.record_hp(hp);
        if stats.is_some() {
            state.stats = stats;
        }
        state.step_error = None;
        state.resume()?;
        Ok(hp)
    }

    /// Toggle an option of a choice on the current step.
    pub async fn toggle(&self, key: &ChoiceKey, option: OptionId) -> Result<bool, LevelUpError> {
        let mut state = self.state.lock().await;
        let step = state.current().ok_or(LevelUpError::NotStarted)?;
        let choice = state
            .choices(step)
            .into_iter()
            .find(|c| &c.key == key)
            .ok_or_else(|| LevelUpError::UnknownChoice(key.to_string()))?;

        state.ledger.seed(&choice);
        let already = state.ledger.get(key).is_some_and(|s| s.contains(&option));
        let changed = if choice.quantity == 1 && !already {
            state.ledger.select_only(&choice, option)
        } else {
            state.ledger.toggle(&choice, option)
        };
        Ok(changed)
    }

    /// Resolve the current step's touched choices, re-fetch the pending
    /// list and move to the next step with outstanding work. On the spells
    /// step the spell collection is rewritten as well.
    pub async fn confirm(&self) -> Result<LevelUpStep, LevelUpError> {
        let _guard = self.save_lock.try_acquire().ok_or(LevelUpError::SaveInFlight)?;

        let (id, step, choices, ledger, submissions) = {
            let state = self.state.lock().await;
            let (id, progress) = state.session()?;
            let step = state.current().ok_or(LevelUpError::NotStarted)?;
            if step == LevelUpStep::HitPoints && progress.hp_choice_pending {
                return Err(LevelUpError::StepIncomplete(step));
            }
            let choices = state.choices(step);
            if !evaluate(&choices, &state.ledger).is_complete() {
                return Err(LevelUpError::StepIncomplete(step));
            }
            let submissions = plain_submissions(&choices, &state.ledger);
            (id, step, choices, state.ledger.clone(), submissions)
        };

        if submissions.is_empty() {
            let mut state = self.state.lock().await;
            return state.resume();
        }

        let spells = if step == LevelUpStep::Spells {
            match self.characters.list_spells(id).await {
                Ok(rows) => Some(spell_ids_after(&rows, &choices, &ledger, &submissions)),
                Err(e) => {
                    self.state.lock().await.step_error = Some(StepError::network(step, &e));
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let outcome = self.sync.resolve_choices(id, &submissions).await;
        {
            let mut state = self.state.lock().await;
            if let Ok(pending) = outcome.pending {
                state.pending.replace(pending);
            }
            if let Some(e) = outcome.error {
                tracing::warn!(character_id = %id, step = %step, error = %e, "Level-up step save failed");
                state.step_error = Some(StepError::network(step, &e));
                return Err(e.into());
            }
        }

        if let Some(spells) = spells {
            let replaced = self.sync.replace_spells(id, &spells).await;
            let mut state = self.state.lock().await;
            if let Some(rows) = replaced.persisted {
                state.spells = rows;
            }
            if let Err(e) = replaced.result {
                state.step_error = Some(StepError::network(step, &e));
                return Err(e.into());
            }
            tracing::info!(character_id = %id, rows = state.spells.len(), "Spells saved");
        }

        let mut state = self.state.lock().await;
        state.step_error = None;
        let next = state.resume()?;
        tracing::info!(character_id = %id, step = %step, next = %next, "Level-up step confirmed");
        Ok(next)
    }

    /// Move to `step`. Leaving HP while it is pending is refused.
    pub async fn enter(&self, step: LevelUpStep) -> Result<(), LevelUpError> {
        let mut state = self.state.lock().await;
        state.progress_mut()?.enter(step)?;
        state.ledger.clear();
        state.step_error = None;
        Ok(())
    }

    /// Close the session once nothing is outstanding.
    pub async fn finish(&self) -> Result<LevelUpProgress, LevelUpError> {
        let mut state = self.state.lock().await;
        let pending = state.pending.choices().to_vec();
        let progress = state.progress_mut()?;
        progress.close(&pending)?;
        let progress = progress.clone();
        tracing::info!(class = %progress.class_slug, "Level-up finished");
        Ok(progress)
    }

    pub async fn is_complete(&self) -> bool {
        let state = self.state.lock().await;
        state
            .progress
            .as_ref()
            .is_some_and(|p| p.is_complete(state.pending.choices()))
    }

    pub async fn current_step(&self) -> Option<LevelUpStep> {
        self.state.lock().await.current()
    }

    pub async fn steps(&self) -> Vec<LevelUpStep> {
        let state = self.state.lock().await;
        state
            .progress
            .as_ref()
            .map(|p| p.steps(state.pending.choices()))
            .unwrap_or_default()
    }

    pub async fn step_choices(&self) -> Vec<PendingChoice> {
        let state = self.state.lock().await;
        state
            .current()
            .map(|step| state.choices(step))
            .unwrap_or_default()
    }

    pub async fn step_completion(&self) -> StepCompletion {
        let state = self.state.lock().await;
        let choices = state
            .current()
            .map(|step| state.choices(step))
            .unwrap_or_default();
        evaluate(&choices, &state.ledger)
    }

    pub async fn progress(&self) -> Option<LevelUpProgress> {
        self.state.lock().await.progress.clone()
    }

    pub async fn step_error(&self) -> Option<StepError<LevelUpStep>> {
        self.state.lock().await.step_error.clone()
    }

    pub async fn stats(&self) -> Option<CharacterStats> {
        self.state.lock().await.stats.clone()
    }

    /// Spell rows as re-fetched after the last spells save.
    pub async fn spells(&self) -> Vec<SpellRow> {
        self.state.lock().await.spells.clone()
    }
}
