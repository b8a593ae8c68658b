extern crate self as charwright_domain;

pub mod abilities;
pub mod choice;
pub mod compendium;
pub mod completion;
pub mod draft;
pub mod error;
pub mod ids;
pub mod ledger;
pub mod level_up;
pub mod names;
pub mod steps;

pub use abilities::{
    ability_modifier, point_buy_cost, point_buy_total, Ability, AbilityScoreMethod,
    AbilityScores, MANUAL_MAX, MANUAL_MIN, POINT_BUY_BUDGET, POINT_BUY_MAX, POINT_BUY_MIN,
    STANDARD_ARRAY,
};
pub use choice::{
    group_by_source, BundleItem, ChoiceKey, ChoiceKeyParts, ChoiceKind, ChoiceOption,
    ChoiceOptions, ChoiceSource, ChoiceType, EquipmentBundle, KindGroup, OptionId,
    PendingChoice, SourceGroup, SourceGroupKey,
};
pub use compendium::{
    answered_group_choice, BackgroundRef, ClassRef, LevelProgression, Modifier,
    ProficiencyGroup, RaceRef, SubraceRef,
};
pub use completion::{
    all_of_kind_complete, effective_equipment_selection, evaluate, evaluate_equipment,
    is_group_complete, persisted_equipment_selections, GroupCompletion, StepCompletion,
};
pub use draft::{
    CharacterPatch, CharacterSnapshot, CharacterStats, CharacterStatus, ClassEntry,
    DraftCharacter, DraftReferences, EquipmentEntry, EquipmentRow, LoadStatus, PendingLevelUp,
    SpellRow, ValidationReport,
};
pub use error::DomainError;
pub use ids::{
    BackgroundId, CharacterId, ClassEntryId, ClassId, EquipmentRowId, ItemId, PublicId, RaceId,
    SpellId, SpellRowId, SubclassId, SubraceId,
};
pub use ledger::{EquipmentLedger, EquipmentSelection, Selection, SelectionLedger};
pub use level_up::{
    HpMethod, LevelUpPhase, LevelUpProgress, LevelUpResult, LevelUpStep,
};
pub use names::CharacterName;
pub use steps::{creation_steps, step_for_choice, CreationStep, StepPlan};
