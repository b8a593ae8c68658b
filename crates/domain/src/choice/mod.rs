//! Pending Choice Model.
//!
//! A pending choice is one outstanding decision surfaced by the rules
//! backend: where it comes from, what kind of decision it is, how many picks
//! it needs, how many remain and which options are legal.

mod grouping;
mod key;
mod kind;
mod options;

pub use grouping::{group_by_source, KindGroup, SourceGroup};
pub use key::{ChoiceKey, ChoiceKeyParts, SourceGroupKey};
pub use kind::{ChoiceKind, ChoiceSource, ChoiceType};
pub use options::{BundleItem, ChoiceOption, ChoiceOptions, EquipmentBundle, OptionId};

/// One outstanding decision.
///
/// # Invariants
///
/// - `quantity >= 1` (enforced by `new`)
/// - `remaining` is server-computed and authoritative; it is never derived
///   locally from the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChoice {
    pub key: ChoiceKey,
    pub choice_type: ChoiceType,
    pub subtype: Option<String>,
    pub source: ChoiceSource,
    pub source_name: Option<String>,
    pub level_granted: Option<u8>,
    pub required: bool,
    pub quantity: u32,
    pub remaining: u32,
    pub selected: Vec<OptionId>,
    pub options: ChoiceOptions,
}

impl PendingChoice {
    /// A required, untouched choice with `remaining == quantity`.
    pub fn new(
        key: impl Into<ChoiceKey>,
        choice_type: ChoiceType,
        source: ChoiceSource,
        quantity: u32,
    ) -> Self {
        let quantity = quantity.max(1);
        Self {
            key: key.into(),
            choice_type,
            subtype: None,
            source,
            source_name: None,
            level_granted: None,
            required: true,
            quantity,
            remaining: quantity,
            selected: Vec::new(),
            options: ChoiceOptions::Unavailable,
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level_granted = Some(level);
        self
    }

    pub fn with_options(mut self, options: ChoiceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Record already-committed picks; `remaining` follows
    /// `quantity - |selected|`.
    pub fn with_selected(mut self, selected: Vec<OptionId>) -> Self {
        self.remaining = self
            .quantity
            .saturating_sub(u32::try_from(selected.len()).unwrap_or(u32::MAX));
        self.selected = selected;
        self
    }

    /// Override the server-computed remaining count.
    pub fn with_remaining(mut self, remaining: u32) -> Self {
        self.remaining = remaining;
        self
    }

    pub fn kind(&self) -> ChoiceKind {
        ChoiceKind::classify(&self.choice_type, self.subtype.as_deref())
    }

    /// Choice-group name submitted with a resolution.
    pub fn group(&self) -> &str {
        self.key.group()
    }

    pub fn source_group_key(&self) -> SourceGroupKey {
        SourceGroupKey::new(self.source.clone(), self.group())
    }

    /// Number of picks the backend already holds.
    pub fn persisted_count(&self) -> usize {
        self.selected.len()
    }

    /// Satisfied on the server: nothing remains to pick.
    ///
    /// `remaining == 0` with an empty `selected` is observed in practice and
    /// counts as satisfied.
    pub fn is_satisfied(&self) -> bool {
        self.remaining == 0
            || self.persisted_count() >= usize::try_from(self.quantity).unwrap_or(usize::MAX)
    }

    /// Still blocks advancement when nothing is done locally.
    pub fn is_outstanding(&self) -> bool {
        self.required && !self.is_satisfied()
    }

    pub fn display_name(&self) -> &str {
        self.source_name
            .as_deref()
            .unwrap_or_else(|| self.source.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skills(quantity: u32) -> PendingChoice {
        PendingChoice::new(
            "proficiency|class|1|1|skills",
            ChoiceType::Proficiency,
            ChoiceSource::Class,
            quantity,
        )
        .with_subtype("skill")
    }

    #[test]
    fn quantity_is_at_least_one() {
        let choice = skills(0);
        assert_eq!(choice.quantity, 1);
        assert_eq!(choice.remaining, 1);
    }

    #[test]
    fn selected_updates_remaining() {
        let choice = skills(2).with_selected(vec!["athletics".into()]);
        assert_eq!(choice.remaining, 1);
        assert!(choice.is_outstanding());

        let done = skills(2).with_selected(vec!["athletics".into(), "stealth".into()]);
        assert_eq!(done.remaining, 0);
        assert!(done.is_satisfied());
    }

    #[test]
    fn zero_remaining_with_empty_selection_is_satisfied() {
        let choice = skills(2).with_remaining(0);
        assert!(choice.selected.is_empty());
        assert!(choice.is_satisfied());
        assert!(!choice.is_outstanding());
    }

    #[test]
    fn optional_choices_never_outstanding() {
        let choice = skills(1).optional();
        assert!(!choice.is_outstanding());
    }

    #[test]
    fn kind_and_group_are_derived() {
        let choice = skills(2);
        assert_eq!(choice.kind(), ChoiceKind::Skill);
        assert_eq!(choice.group(), "skills");
        assert_eq!(choice.source_group_key().to_string(), "class:skills");
    }

    #[test]
    fn display_name_falls_back_to_source_label() {
        assert_eq!(skills(1).display_name(), "Class");
        assert_eq!(
            skills(1).with_source_name("Fighter").display_name(),
            "Fighter"
        );
    }
}
