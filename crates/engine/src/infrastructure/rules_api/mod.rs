//! REST client for the rules backend.
//!
//! Implements both `CharacterApi` and `CompendiumApi` over one `reqwest`
//! client. Retries are not done here; callers wrap operations in
//! `with_retry` where re-running them is safe.

mod convert;

use async_trait::async_trait;
use charwright_domain::{
    BackgroundId, BackgroundRef, CharacterId, CharacterPatch, CharacterSnapshot, CharacterStats,
    ChoiceKey, ClassEntry, ClassEntryId, ClassId, ClassRef, EquipmentEntry, EquipmentRow,
    EquipmentRowId, HpMethod, LevelUpResult, PendingChoice, RaceId, RaceRef, SpellId, SpellRow,
    SpellRowId, ValidationReport,
};
use charwright_shared::{
    AddClassRequest, AddSpellRequest, BackgroundResponse, CharacterResponse, ClassEntryResponse,
    ClassListResponse, ClassResponse, CreateCharacterRequest, EquipmentListResponse,
    EquipmentRowResponse, HpChoiceRequest, HpChoiceResponse, LevelUpResponse,
    PendingChoicesResponse, RaceResponse, ResolveChoiceRequest, SpellListResponse,
    SpellRowResponse, StatsResponse, ValidationResponse,
};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::ports::{ApiError, CharacterApi, ChoiceResolution, CompendiumApi};

/// Client for the rules backend REST API
#[derive(Clone)]
pub struct RulesApiClient {
    client: Client,
    base_url: Url,
}

impl RulesApiClient {
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, base_url }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.api_url.clone(), config.timeout)
    }

    /// Join path segments onto the base URL. Each segment is percent-encoded,
    /// so a choice key containing `/` stays one segment.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::network(self.base_url.as_str(), "base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<(String, reqwest::Response), ApiError> {
        let url = self.url(segments)?;
        let path = url.path().to_string();
        tracing::debug!(%method, path = %path, "Calling rules backend");

        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(path.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::status(path, status.as_u16(), body));
        }
        Ok((path, response))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&(impl Serialize + ?Sized)>,
    ) -> Result<T, ApiError> {
        let (path, response) = self.send(method, segments, body).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::invalid_response(path, e))
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        self.fetch(Method::GET, segments, None::<&()>).await
    }

    /// Send and ignore whatever body comes back.
    async fn execute(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&(impl Serialize + ?Sized)>,
    ) -> Result<(), ApiError> {
        self.send(method, segments, body).await.map(|_| ())
    }
}

#[async_trait]
impl CharacterApi for RulesApiClient {
    async fn create_character(&self, name: &str) -> Result<CharacterSnapshot, ApiError> {
        let body = CreateCharacterRequest {
            name: name.to_string(),
        };
        let response: CharacterResponse = self
            .fetch(Method::POST, &["characters"], Some(&body))
            .await?;
        Ok(convert::snapshot(response))
    }

    async fn get_character(&self, id: CharacterId) -> Result<CharacterSnapshot, ApiError> {
        let response: CharacterResponse = self.get(&["characters", &id.to_string()]).await?;
        Ok(convert::snapshot(response))
    }

    async fn update_character(
        &self,
        id: CharacterId,
        patch: &CharacterPatch,
    ) -> Result<(), ApiError> {
        let body = convert::patch_request(patch);
        self.execute(Method::PATCH, &["characters", &id.to_string()], Some(&body))
            .await
    }

    async fn delete_character(&self, id: CharacterId) -> Result<(), ApiError> {
        self.execute(Method::DELETE, &["characters", &id.to_string()], None::<&()>)
            .await
    }

    async fn list_classes(&self, id: CharacterId) -> Result<Vec<ClassEntry>, ApiError> {
        let response: ClassListResponse = self
            .get(&["characters", &id.to_string(), "classes"])
            .await?;
        Ok(response
            .classes
            .into_iter()
            .map(convert::class_entry)
            .collect())
    }

    async fn add_class(
        &self,
        id: CharacterId,
        class_id: ClassId,
        level: u8,
        is_primary: bool,
    ) -> Result<ClassEntry, ApiError> {
        let body = AddClassRequest {
            class_id: class_id.get(),
            level,
            is_primary,
        };
        let response: ClassEntryResponse = self
            .fetch(
                Method::POST,
                &["characters", &id.to_string(), "classes"],
                Some(&body),
            )
            .await?;
        Ok(convert::class_entry(response))
    }

    async fn remove_class(&self, id: CharacterId, entry_id: ClassEntryId) -> Result<(), ApiError> {
        self.execute(
            Method::DELETE,
            &["characters", &id.to_string(), "classes", &entry_id.to_string()],
            None::<&()>,
        )
        .await
    }

    async fn pending_choices(&self, id: CharacterId) -> Result<Vec<PendingChoice>, ApiError> {
        let response: PendingChoicesResponse = self
            .get(&["characters", &id.to_string(), "pending-choices"])
            .await?;
        Ok(response
            .choices
            .into_iter()
            .map(convert::pending_choice)
            .collect())
    }

    async fn resolve_choice(
        &self,
        id: CharacterId,
        choice: &ChoiceKey,
        resolution: &ChoiceResolution,
    ) -> Result<(), ApiError> {
        let body = ResolveChoiceRequest {
            source: resolution.source.clone(),
            choice_group: resolution.choice_group.clone(),
            selected: resolution
                .selected
                .iter()
                .map(|o| o.as_str().to_string())
                .collect(),
        };
        self.execute(
            Method::POST,
            &["characters", &id.to_string(), "choices", choice.as_str()],
            Some(&body),
        )
        .await
    }

    async fn list_equipment(&self, id: CharacterId) -> Result<Vec<EquipmentRow>, ApiError> {
        let response: EquipmentListResponse = self
            .get(&["characters", &id.to_string(), "equipment"])
            .await?;
        Ok(response
            .equipment
            .into_iter()
            .map(convert::equipment_row)
            .collect())
    }

    async fn add_equipment(
        &self,
        id: CharacterId,
        entry: &EquipmentEntry,
    ) -> Result<EquipmentRow, ApiError> {
        let body = convert::equipment_request(entry);
        let response: EquipmentRowResponse = self
            .fetch(
                Method::POST,
                &["characters", &id.to_string(), "equipment"],
                Some(&body),
            )
            .await?;
        Ok(convert::equipment_row(response))
    }

    async fn remove_equipment(&self, id: CharacterId, row: EquipmentRowId) -> Result<(), ApiError> {
        self.execute(
            Method::DELETE,
            &["characters", &id.to_string(), "equipment", &row.to_string()],
            None::<&()>,
        )
        .await
    }

    async fn list_spells(&self, id: CharacterId) -> Result<Vec<SpellRow>, ApiError> {
        let response: SpellListResponse = self
            .get(&["characters", &id.to_string(), "spells"])
            .await?;
        Ok(response.spells.into_iter().map(convert::spell_row).collect())
    }

    async fn add_spell(&self, id: CharacterId, spell: SpellId) -> Result<SpellRow, ApiError> {
        let body = AddSpellRequest {
            spell_id: spell.get(),
        };
        let response: SpellRowResponse = self
            .fetch(
                Method::POST,
                &["characters", &id.to_string(), "spells"],
                Some(&body),
            )
            .await?;
        Ok(convert::spell_row(response))
    }

    async fn remove_spell(&self, id: CharacterId, row: SpellRowId) -> Result<(), ApiError> {
        self.execute(
            Method::DELETE,
            &["characters", &id.to_string(), "spells", &row.to_string()],
            None::<&()>,
        )
        .await
    }

    async fn stats(&self, id: CharacterId) -> Result<CharacterStats, ApiError> {
        let response: StatsResponse = self.get(&["characters", &id.to_string(), "stats"]).await?;
        Ok(convert::stats(response))
    }

    async fn validation(&self, id: CharacterId) -> Result<ValidationReport, ApiError> {
        let response: ValidationResponse = self
            .get(&["characters", &id.to_string(), "validation"])
            .await?;
        Ok(convert::validation(response))
    }

    async fn level_up(&self, id: CharacterId, class_slug: &str) -> Result<LevelUpResult, ApiError> {
        let response: LevelUpResponse = self
            .fetch(
                Method::POST,
                &["characters", &id.to_string(), "classes", class_slug, "level-up"],
                None::<&()>,
            )
            .await?;
        Ok(convert::level_up_result(response))
    }

    async fn choose_hp(
        &self,
        id: CharacterId,
        class_slug: &str,
        method: HpMethod,
    ) -> Result<i32, ApiError> {
        let body = HpChoiceRequest {
            method: method.as_str().to_string(),
        };
        let response: HpChoiceResponse = self
            .fetch(
                Method::POST,
                &["characters", &id.to_string(), "classes", class_slug, "hp-choice"],
                Some(&body),
            )
            .await?;
        Ok(response.hp_increase)
    }
}

#[async_trait]
impl CompendiumApi for RulesApiClient {
    async fn race(&self, id: RaceId) -> Result<RaceRef, ApiError> {
        let response: RaceResponse = self.get(&["races", &id.to_string()]).await?;
        Ok(convert::race(response))
    }

    async fn class(&self, id: ClassId) -> Result<ClassRef, ApiError> {
        let response: ClassResponse = self.get(&["classes", &id.to_string()]).await?;
        Ok(convert::class(response))
    }

    async fn background(&self, id: BackgroundId) -> Result<BackgroundRef, ApiError> {
        let response: BackgroundResponse = self.get(&["backgrounds", &id.to_string()]).await?;
        Ok(convert::background(response))
    }
}
