//! Synchronization Protocol.
//!
//! Turns confirmed local state into backend mutations. Three save shapes:
//!
//! - scalar patch of the character record;
//! - collection replace for row-modelled collections (equipment, spells),
//!   which lists, deletes every row, then inserts the local set;
//! - choice resolution by composite key, followed by a re-fetch of the
//!   pending list.
//!
//! Multi-call sequences are retried from the top as one operation.

use std::sync::Arc;

use async_trait::async_trait;
use charwright_domain::{
    CharacterId, CharacterPatch, ChoiceKey, ClassEntry, ClassId, EquipmentEntry, EquipmentRow,
    PendingChoice, SpellId, SpellRow,
};

use crate::infrastructure::ports::{ApiError, CharacterApi};
use crate::infrastructure::retry::{with_retry, RetryConfig};
use crate::use_cases::choices::ChoiceSubmission;

/// Result of a collection replace.
///
/// `persisted` is the collection as re-fetched after the attempt, whether
/// or not it succeeded; `None` only when that re-fetch failed too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome<R> {
    pub result: Result<(), ApiError>,
    pub persisted: Option<Vec<R>>,
}

/// Result of resolving a batch of choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOutcome {
    /// Keys resolved before the first failure, in submission order.
    pub resolved: Vec<ChoiceKey>,
    pub error: Option<ApiError>,
    /// The authoritative pending list fetched after the submissions.
    pub pending: Result<Vec<PendingChoice>, ApiError>,
}

impl ResolveOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A row-modelled collection under a character.
#[async_trait]
trait RowCollection: Send + Sync {
    type Row: Send + Sync;
    type Entry: Send + Sync;

    const NAME: &'static str;

    async fn list(&self, id: CharacterId) -> Result<Vec<Self::Row>, ApiError>;

    async fn remove(&self, id: CharacterId, row: &Self::Row) -> Result<(), ApiError>;

    async fn add(&self, id: CharacterId, entry: &Self::Entry) -> Result<Self::Row, ApiError>;
}

struct EquipmentRows<'a>(&'a dyn CharacterApi);

#[async_trait]
impl RowCollection for EquipmentRows<'_> {
    type Row = EquipmentRow;
    type Entry = EquipmentEntry;

    const NAME: &'static str = "replace_equipment";

    async fn list(&self, id: CharacterId) -> Result<Vec<EquipmentRow>, ApiError> {
        self.0.list_equipment(id).await
    }

    async fn remove(&self, id: CharacterId, row: &EquipmentRow) -> Result<(), ApiError> {
        self.0.remove_equipment(id, row.id).await
    }

    async fn add(&self, id: CharacterId, entry: &EquipmentEntry) -> Result<EquipmentRow, ApiError> {
        self.0.add_equipment(id, entry).await
    }
}

struct SpellRows<'a>(&'a dyn CharacterApi);

#[async_trait]
impl RowCollection for SpellRows<'_> {
    type Row = SpellRow;
    type Entry = SpellId;

    const NAME: &'static str = "replace_spells";

    async fn list(&self, id: CharacterId) -> Result<Vec<SpellRow>, ApiError> {
        self.0.list_spells(id).await
    }

    async fn remove(&self, id: CharacterId, row: &SpellRow) -> Result<(), ApiError> {
        self.0.remove_spell(id, row.id).await
    }

    async fn add(&self, id: CharacterId, spell: &SpellId) -> Result<SpellRow, ApiError> {
        self.0.add_spell(id, *spell).await
    }
}

/// The save procedures shared by the creation and level-up wizards.
pub struct SyncProtocol {
    characters: Arc<dyn CharacterApi>,
    retry: RetryConfig,
}

impl SyncProtocol {
    pub fn new(characters: Arc<dyn CharacterApi>, retry: RetryConfig) -> Self {
        Self { characters, retry }
    }

    /// Single partial update. Empty patches are not sent.
    pub async fn patch(&self, id: CharacterId, patch: &CharacterPatch) -> Result<(), ApiError> {
        if patch.is_empty() {
            tracing::debug!(character_id = %id, "Skipping empty character patch");
            return Ok(());
        }
        let api = self.characters.as_ref();
        with_retry(&self.retry, "patch_character", || api.update_character(id, patch)).await?;
        tracing::debug!(character_id = %id, "Character patched");
        Ok(())
    }

    /// Level-1 class assignment: remove every class entry, then add exactly
    /// one primary entry at level 1.
    pub async fn assign_class(
        &self,
        id: CharacterId,
        class_id: ClassId,
    ) -> Result<ClassEntry, ApiError> {
        let api = self.characters.as_ref();
        let entry = with_retry(&self.retry, "assign_class", || async move {
            let existing = api.list_classes(id).await?;
            for entry in &existing {
                match entry.id {
                    Some(entry_id) => api.remove_class(id, entry_id).await?,
                    None => tracing::warn!(
                        character_id = %id,
                        class_id = %entry.class_id,
                        "Class entry without a row id, cannot remove"
                    ),
                }
            }
            api.add_class(id, class_id, 1, true).await
        })
        .await?;

        tracing::info!(character_id = %id, class_id = %class_id, "Class assigned");
        Ok(entry)
    }

    pub async fn replace_equipment(
        &self,
        id: CharacterId,
        entries: &[EquipmentEntry],
    ) -> ReplaceOutcome<EquipmentRow> {
        self.replace(&EquipmentRows(self.characters.as_ref()), id, entries)
            .await
    }

    pub async fn replace_spells(&self, id: CharacterId, spells: &[SpellId]) -> ReplaceOutcome<SpellRow> {
        self.replace(&SpellRows(self.characters.as_ref()), id, spells)
            .await
    }

    /// Delete every persisted row, then insert one per entry. Each attempt
    /// starts again from the listing, so rows left by a failed attempt are
    /// cleared before inserting. The collection is always re-fetched.
    async fn replace<C: RowCollection>(
        &self,
        collection: &C,
        id: CharacterId,
        entries: &[C::Entry],
    ) -> ReplaceOutcome<C::Row> {
        let result = with_retry(&self.retry, C::NAME, || async move {
            let existing = collection.list(id).await?;
            for row in &existing {
                collection.remove(id, row).await?;
            }
            for entry in entries {
                collection.add(id, entry).await?;
            }
            Ok(())
        })
        .await;

        if let Err(e) = &result {
            tracing::error!(
                character_id = %id,
                collection = C::NAME,
                error = %e,
                "Collection replace failed, persisted rows may be incomplete"
            );
        }

        let persisted = match collection.list(id).await {
            Ok(rows) => {
                tracing::debug!(
                    character_id = %id,
                    collection = C::NAME,
                    rows = rows.len(),
                    "Re-fetched collection after replace"
                );
                Some(rows)
            }
            Err(e) => {
                tracing::warn!(
                    character_id = %id,
                    collection = C::NAME,
                    error = %e,
                    "Failed to re-fetch collection after replace"
                );
                None
            }
        };

        ReplaceOutcome { result, persisted }
    }

    /// Submit each resolution in order, stopping at the first failure, then
    /// re-fetch the pending list. The re-fetch happens even after a failure
    /// so the evaluator sees what did land.
    pub async fn resolve_choices(
        &self,
        id: CharacterId,
        submissions: &[ChoiceSubmission],
    ) -> ResolveOutcome {
        let api = self.characters.as_ref();
        let mut resolved = Vec::with_capacity(submissions.len());
        let mut error = None;

        for submission in submissions {
            let key = &submission.key;
            let resolution = &submission.resolution;
            match with_retry(&self.retry, "resolve_choice", || {
                api.resolve_choice(id, key, resolution)
            })
            .await
            {
                Ok(()) => {
                    tracing::debug!(
                        character_id = %id,
                        choice_id = %key,
                        selected = resolution.selected.len(),
                        "Choice resolved"
                    );
                    resolved.push(key.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        character_id = %id,
                        choice_id = %key,
                        error = %e,
                        "Choice resolution failed"
                    );
                    error = Some(e);
                    break;
                }
            }
        }

        let pending = with_retry(&self.retry, "pending_choices", || api.pending_choices(id)).await;

        ResolveOutcome {
            resolved,
            error,
            pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{ChoiceResolution, MockCharacterApi};
    use charwright_domain::{
        ChoiceSource, ChoiceType, ClassEntryId, EquipmentRowId, ItemId, OptionId, SpellRowId,
    };
    use mockall::predicate::*;
    use mockall::Sequence;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 1,
            jitter_factor: 0.0,
        }
    }

    fn mace() -> EquipmentEntry {
        EquipmentEntry::Catalog {
            item_id: ItemId::new(101),
            quantity: 1,
        }
    }

    fn row(id: i64, entry: EquipmentEntry) -> EquipmentRow {
        EquipmentRow {
            id: EquipmentRowId::new(id),
            entry,
            name: None,
        }
    }

    fn submission(key: &str, picks: &[&str]) -> ChoiceSubmission {
        let choice = PendingChoice::new(key, ChoiceType::Proficiency, ChoiceSource::Class, 2);
        ChoiceSubmission {
            key: choice.key.clone(),
            resolution: ChoiceResolution::for_choice(
                &choice,
                picks.iter().map(|p| OptionId::from(*p)).collect(),
            ),
        }
    }

    #[tokio::test]
    async fn empty_patch_is_not_sent() {
        let mut api = MockCharacterApi::new();
        api.expect_update_character().never();

        let sync = SyncProtocol::new(Arc::new(api), fast());
        sync.patch(CharacterId::new(1), &CharacterPatch::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn replace_deletes_everything_before_inserting() {
        let mut seq = Sequence::new();
        let mut api = MockCharacterApi::new();
        let id = CharacterId::new(1);
        let old = EquipmentEntry::Custom {
            name: "Holy symbol".into(),
            quantity: 1,
        };

        api.expect_list_equipment()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(vec![row(1, mace()), row(2, old.clone())]));
        api.expect_remove_equipment()
            .with(eq(id), eq(EquipmentRowId::new(1)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        api.expect_remove_equipment()
            .with(eq(id), eq(EquipmentRowId::new(2)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        api.expect_add_equipment()
            .with(eq(id), eq(mace()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, entry| Ok(row(3, entry.clone())));
        api.expect_list_equipment()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![row(3, mace())]));

        let sync = SyncProtocol::new(Arc::new(api), fast());
        let outcome = sync.replace_equipment(id, &[mace()]).await;

        assert_eq!(outcome.result, Ok(()));
        assert_eq!(outcome.persisted, Some(vec![row(3, mace())]));
    }

    #[tokio::test]
    async fn failed_replace_restarts_from_listing_and_refetches() {
        let mut seq = Sequence::new();
        let mut api = MockCharacterApi::new();
        let id = CharacterId::new(1);

        // First attempt: nothing to delete, insert fails transiently.
        api.expect_list_equipment()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![]));
        api.expect_add_equipment()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(ApiError::status("/characters/1/equipment", 503, "")));
        // Second attempt starts over with a fresh listing.
        api.expect_list_equipment()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![]));
        api.expect_add_equipment()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, entry| Ok(row(9, entry.clone())));
        api.expect_list_equipment()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![row(9, mace())]));

        let sync = SyncProtocol::new(Arc::new(api), fast());
        let outcome = sync.replace_equipment(id, &[mace()]).await;

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.persisted.map(|rows| rows.len()), Some(1));
    }

    #[tokio::test]
    async fn exhausted_replace_still_reports_persisted_rows() {
        let mut api = MockCharacterApi::new();
        let id = CharacterId::new(1);
        let mut listings = 0;
        api.expect_list_equipment().returning(move |_| {
            listings += 1;
            if listings == 1 {
                Ok(vec![row(1, mace())])
            } else {
                Ok(vec![])
            }
        });
        api.expect_remove_equipment().returning(|_, _| Ok(()));
        api.expect_add_equipment()
            .returning(|_, _| Err(ApiError::status("/characters/1/equipment", 422, "bad item")));

        let sync = SyncProtocol::new(Arc::new(api), fast());
        let outcome = sync.replace_equipment(id, &[mace()]).await;

        assert!(matches!(outcome.result, Err(ApiError::Status { status: 422, .. })));
        assert_eq!(outcome.persisted, Some(vec![]));
    }

    #[tokio::test]
    async fn replace_spells_uses_spell_rows() {
        let mut api = MockCharacterApi::new();
        let id = CharacterId::new(4);
        let mut listed = false;
        api.expect_list_spells().times(2).returning(move |_| {
            if listed {
                Ok(vec![SpellRow {
                    id: SpellRowId::new(8),
                    spell_id: SpellId::new(201),
                    name: None,
                }])
            } else {
                listed = true;
                Ok(vec![])
            }
        });
        api.expect_add_spell()
            .with(eq(id), eq(SpellId::new(201)))
            .times(1)
            .returning(|_, spell| {
                Ok(SpellRow {
                    id: SpellRowId::new(8),
                    spell_id: spell,
                    name: None,
                })
            });

        let sync = SyncProtocol::new(Arc::new(api), fast());
        let outcome = sync.replace_spells(id, &[SpellId::new(201)]).await;
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.persisted.unwrap()[0].spell_id, SpellId::new(201));
    }

    #[tokio::test]
    async fn assign_class_clears_then_adds_one_primary() {
        let mut seq = Sequence::new();
        let mut api = MockCharacterApi::new();
        let id = CharacterId::new(2);

        api.expect_list_classes()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                let mut entry = ClassEntry::primary(ClassId::new(12));
                entry.id = Some(ClassEntryId::new(40));
                Ok(vec![entry])
            });
        api.expect_remove_class()
            .with(eq(id), eq(ClassEntryId::new(40)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        api.expect_add_class()
            .with(eq(id), eq(ClassId::new(5)), eq(1u8), eq(true))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, class_id, _, _| {
                let mut entry = ClassEntry::primary(class_id);
                entry.id = Some(ClassEntryId::new(41));
                Ok(entry)
            });

        let sync = SyncProtocol::new(Arc::new(api), fast());
        let entry = sync.assign_class(id, ClassId::new(5)).await.unwrap();
        assert_eq!(entry.class_id, ClassId::new(5));
        assert!(entry.is_primary);
    }

    #[tokio::test]
    async fn pending_refetch_follows_every_submission() {
        let mut seq = Sequence::new();
        let mut api = MockCharacterApi::new();
        let id = CharacterId::new(3);

        api.expect_resolve_choice()
            .withf(|_, key, _| key.as_str() == "proficiency|class|5|1|skills")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        api.expect_resolve_choice()
            .withf(|_, key, _| key.as_str() == "language|background|3|1|languages")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));
        api.expect_pending_choices()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![]));

        let sync = SyncProtocol::new(Arc::new(api), fast());
        let outcome = sync
            .resolve_choices(
                id,
                &[
                    submission("proficiency|class|5|1|skills", &["athletics", "history"]),
                    submission("language|background|3|1|languages", &["elvish"]),
                ],
            )
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.resolved.len(), 2);
        assert_eq!(outcome.pending, Ok(vec![]));
    }

    #[tokio::test]
    async fn resolution_stops_at_first_failure_but_still_refetches() {
        let mut api = MockCharacterApi::new();
        api.expect_resolve_choice()
            .times(1)
            .returning(|_, _, _| Err(ApiError::status("/characters/3/choices/x", 422, "invalid")));
        api.expect_pending_choices().times(1).returning(|_| Ok(vec![]));

        let sync = SyncProtocol::new(Arc::new(api), fast());
        let outcome = sync
            .resolve_choices(
                CharacterId::new(3),
                &[
                    submission("proficiency|class|5|1|skills", &["athletics"]),
                    submission("language|race|1|1|languages", &["dwarvish"]),
                ],
            )
            .await;

        assert!(!outcome.is_success());
        assert!(outcome.resolved.is_empty());
        assert!(outcome.pending.is_ok());
    }
}
