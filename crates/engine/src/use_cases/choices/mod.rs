//! Pending choice fetch, grouping and resolution payloads.

use std::collections::BTreeSet;
use std::sync::Arc;

use charwright_domain::{
    group_by_source, CharacterId, ChoiceKey, ChoiceKind, ChoiceSource, EquipmentLedger, OptionId,
    PendingChoice, SelectionLedger, SourceGroup, SpellId, SpellRow,
};

use crate::infrastructure::ports::{ApiError, CharacterApi, ChoiceResolution};

/// The last successfully fetched pending choices.
///
/// A failed refresh leaves the previous list in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChoiceList {
    choices: Vec<PendingChoice>,
    loaded: bool,
}

impl PendingChoiceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, choices: Vec<PendingChoice>) {
        self.choices = choices;
        self.loaded = true;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn choices(&self) -> &[PendingChoice] {
        &self.choices
    }

    pub fn get(&self, key: &ChoiceKey) -> Option<&PendingChoice> {
        self.choices.iter().find(|c| &c.key == key)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn grouped(&self) -> Vec<SourceGroup<'_>> {
        group_by_source(&self.choices)
    }

    pub fn outstanding(&self) -> impl Iterator<Item = &PendingChoice> {
        self.choices.iter().filter(|c| c.is_outstanding())
    }
}

/// Fetch pending choices use case.
pub struct FetchPendingChoices {
    characters: Arc<dyn CharacterApi>,
}

impl FetchPendingChoices {
    pub fn new(characters: Arc<dyn CharacterApi>) -> Self {
        Self { characters }
    }

    pub async fn execute(&self, character_id: CharacterId) -> Result<Vec<PendingChoice>, ApiError> {
        let choices = self.characters.pending_choices(character_id).await?;

        for choice in &choices {
            if let ChoiceSource::Other(source) = &choice.source {
                tracing::debug!(
                    choice_id = %choice.key,
                    source = %source,
                    "Pending choice from an unrecognised source"
                );
            }
            if choice.kind() == ChoiceKind::Unrecognized {
                tracing::debug!(
                    choice_id = %choice.key,
                    choice_type = %choice.choice_type,
                    subtype = ?choice.subtype,
                    "Pending choice of an unrecognised type"
                );
            }
        }
        tracing::debug!(
            character_id = %character_id,
            total = choices.len(),
            outstanding = choices.iter().filter(|c| c.is_outstanding()).count(),
            "Fetched pending choices"
        );
        Ok(choices)
    }

    /// Refresh `list` in place; on failure the previous choices are kept.
    pub async fn refresh(
        &self,
        character_id: CharacterId,
        list: &mut PendingChoiceList,
    ) -> Result<(), ApiError> {
        let choices = self.execute(character_id).await?;
        list.replace(choices);
        Ok(())
    }
}

/// One resolution to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceSubmission {
    pub key: ChoiceKey,
    pub resolution: ChoiceResolution,
}

/// Submissions for every touched choice among `choices`.
pub fn plain_submissions<'a>(
    choices: impl IntoIterator<Item = &'a PendingChoice>,
    ledger: &SelectionLedger,
) -> Vec<ChoiceSubmission> {
    choices
        .into_iter()
        .filter_map(|choice| {
            let selection = ledger.get(&choice.key).filter(|s| s.is_touched())?;
            Some(ChoiceSubmission {
                key: choice.key.clone(),
                resolution: ChoiceResolution::for_choice(choice, selection.picks().cloned().collect()),
            })
        })
        .collect()
}

/// Submissions for every equipment choice with a local bundle pick. The
/// submitted option is the bundle id; item picks are persisted as rows.
pub fn equipment_submissions<'a>(
    choices: impl IntoIterator<Item = &'a PendingChoice>,
    ledger: &EquipmentLedger,
) -> Vec<ChoiceSubmission> {
    choices
        .into_iter()
        .filter_map(|choice| {
            let selection = ledger.get(&choice.key)?;
            Some(ChoiceSubmission {
                key: choice.key.clone(),
                resolution: ChoiceResolution::for_choice(choice, vec![selection.option.clone()]),
            })
        })
        .collect()
}

/// The spell collection after `submissions` land: rows behind a touched
/// choice's options are dropped, every other row stays, and the new picks
/// are appended.
pub fn spell_ids_after(
    rows: &[SpellRow],
    choices: &[PendingChoice],
    ledger: &SelectionLedger,
    submissions: &[ChoiceSubmission],
) -> Vec<SpellId> {
    let replaced_options: BTreeSet<&str> = choices
        .iter()
        .filter(|c| ledger.is_touched(&c.key))
        .flat_map(|c| c.options.option_ids())
        .map(OptionId::as_str)
        .collect();

    let mut spells: Vec<SpellId> = rows
        .iter()
        .filter(|row| !replaced_options.contains(row.spell_id.to_string().as_str()))
        .map(|row| row.spell_id)
        .collect();
    for submission in submissions {
        for pick in &submission.resolution.selected {
            match pick.as_str().parse::<SpellId>() {
                Ok(spell) if !spells.contains(&spell) => spells.push(spell),
                Ok(_) => {}
                Err(e) => tracing::warn!(
                    choice_id = %submission.key,
                    option = %pick,
                    error = %e,
                    "Spell pick is not a spell id, not stored as a row"
                ),
            }
        }
    }
    spells
}
