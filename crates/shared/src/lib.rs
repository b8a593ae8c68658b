//! Charwright Shared - wire-format DTOs for the rules backend
//!
//! This crate contains the request and response bodies of the backend's
//! REST contract:
//! - character record, class entries and derived stats
//! - pending choices and choice resolution
//! - equipment and spell rows
//! - level-up and HP choice
//! - compendium reference data (races, classes, backgrounds)
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde and serde_json
//! 2. **No business logic** - Pure data types and serialization
//! 3. **No domain IDs** - raw `i64` keys in DTOs

pub mod compendium;
pub mod requests;
pub mod responses;

pub use compendium::{
    BackgroundResponse, ClassResponse, ModifierDto, OptionDto, ProficiencyChoiceDto,
    ProgressionRowDto, RaceResponse, SubraceResponse,
};
pub use requests::{
    AbilityScoresDto, AddClassRequest, AddEquipmentRequest, AddSpellRequest,
    CreateCharacterRequest, HpChoiceRequest, ResolveChoiceRequest, UpdateCharacterRequest,
};
pub use responses::{
    CharacterResponse, ClassEntryResponse, ClassListResponse, EquipmentListResponse,
    EquipmentRowResponse, HpChoiceResponse, LevelUpResponse, PendingChoiceDto,
    PendingChoicesResponse, PendingLevelUpResponse, ResolveChoiceResponse, SpellListResponse,
    SpellRowResponse, StatsResponse, ValidationResponse,
};
