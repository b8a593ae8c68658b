//! Step Sequencer for character creation.
//!
//! The step list is a pure function of the draft and the current pending
//! choices. It is recomputed on every read and never cached.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::choice::{ChoiceKind, ChoiceSource, PendingChoice};
use crate::compendium::{answered_group_choice, ProficiencyGroup};
use crate::draft::DraftCharacter;

/// Creation steps in spine order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CreationStep {
    Name,
    Race,
    Subrace,
    Class,
    Abilities,
    Background,
    ProficiencyChoices,
    Feat,
    Equipment,
    Spells,
    Review,
}

impl CreationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreationStep::Name => "name",
            CreationStep::Race => "race",
            CreationStep::Subrace => "subrace",
            CreationStep::Class => "class",
            CreationStep::Abilities => "abilities",
            CreationStep::Background => "background",
            CreationStep::ProficiencyChoices => "proficiency_choices",
            CreationStep::Feat => "feat",
            CreationStep::Equipment => "equipment",
            CreationStep::Spells => "spells",
            CreationStep::Review => "review",
        }
    }

    /// Whether this step resolves pending choices.
    pub fn has_choices(&self) -> bool {
        matches!(
            self,
            CreationStep::ProficiencyChoices
                | CreationStep::Feat
                | CreationStep::Equipment
                | CreationStep::Spells
        )
    }
}

impl fmt::Display for CreationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The step a pending choice is resolved on.
///
/// Spell choices only get their own step when the class really casts at
/// this level, and feat choices only when the race grants a bonus feat;
/// otherwise they are listed with the other proficiency choices so they
/// are never unreachable.
pub fn step_for_choice(choice: &PendingChoice, draft: &DraftCharacter) -> CreationStep {
    match choice.kind() {
        ChoiceKind::Equipment => CreationStep::Equipment,
        ChoiceKind::Cantrip | ChoiceKind::Spell if draft.is_caster() => CreationStep::Spells,
        ChoiceKind::Feat if draft.grants_bonus_feat() => CreationStep::Feat,
        _ => CreationStep::ProficiencyChoices,
    }
}

fn reference_groups(draft: &DraftCharacter) -> Vec<(ChoiceSource, i64, &ProficiencyGroup)> {
    let mut groups = Vec::new();
    if let Some(class) = &draft.class {
        groups.extend(
            class
                .proficiency_groups
                .iter()
                .map(|g| (ChoiceSource::Class, class.id.get(), g)),
        );
    }
    if let Some(race) = &draft.race {
        groups.extend(
            race.proficiency_groups
                .iter()
                .map(|g| (ChoiceSource::Race, race.id.get(), g)),
        );
    }
    if let Some(background) = &draft.background {
        groups.extend(
            background
                .proficiency_groups
                .iter()
                .map(|g| (ChoiceSource::Background, background.id.get(), g)),
        );
    }
    groups
}

/// Pending choices resolved on `step`.
///
/// For the proficiency step, groups declared by reference data but absent
/// from the pending list are added as already-answered entries so they can
/// be revisited.
pub fn choices_for_step(
    step: CreationStep,
    draft: &DraftCharacter,
    pending: &[PendingChoice],
) -> Vec<PendingChoice> {
    let mut choices: Vec<PendingChoice> = pending
        .iter()
        .filter(|c| step_for_choice(c, draft) == step)
        .cloned()
        .collect();

    if step == CreationStep::ProficiencyChoices {
        for (source, source_id, group) in reference_groups(draft) {
            let known = pending
                .iter()
                .any(|c| c.source == source && c.group() == group.group);
            if !known {
                choices.push(answered_group_choice(source, source_id, group));
            }
        }
    }
    choices
}

/// The ordered creation steps for the draft as it stands.
pub fn creation_steps(draft: &DraftCharacter, pending: &[PendingChoice]) -> Vec<CreationStep> {
    let mut steps = vec![CreationStep::Name, CreationStep::Race];
    if draft.needs_subrace() {
        steps.push(CreationStep::Subrace);
    }
    steps.extend([
        CreationStep::Class,
        CreationStep::Abilities,
        CreationStep::Background,
    ]);

    let has_proficiency_groups = !reference_groups(draft).is_empty()
        || pending
            .iter()
            .any(|c| step_for_choice(c, draft) == CreationStep::ProficiencyChoices);
    if has_proficiency_groups {
        steps.push(CreationStep::ProficiencyChoices);
    }
    if draft.grants_bonus_feat() {
        steps.push(CreationStep::Feat);
    }
    steps.push(CreationStep::Equipment);
    if draft.is_caster() {
        steps.push(CreationStep::Spells);
    }
    steps.push(CreationStep::Review);
    steps
}

/// Position and neighbours of a step within a computed step list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPlan {
    steps: Vec<CreationStep>,
}

impl StepPlan {
    pub fn new(steps: Vec<CreationStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[CreationStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, step: CreationStep) -> bool {
        self.steps.contains(&step)
    }

    pub fn first(&self) -> CreationStep {
        self.steps.first().copied().unwrap_or(CreationStep::Name)
    }

    pub fn index_of(&self, step: CreationStep) -> Option<usize> {
        self.steps.iter().position(|s| *s == step)
    }

    /// `step` if it is still part of the plan, otherwise the nearest earlier
    /// surviving step.
    pub fn settle(&self, step: CreationStep) -> CreationStep {
        if self.contains(step) {
            return step;
        }
        self.steps
            .iter()
            .rev()
            .find(|s| **s < step)
            .copied()
            .unwrap_or_else(|| self.first())
    }

    pub fn next(&self, step: CreationStep) -> Option<CreationStep> {
        let current = self.settle(step);
        self.index_of(current)
            .and_then(|i| self.steps.get(i + 1))
            .copied()
    }

    pub fn previous(&self, step: CreationStep) -> Option<CreationStep> {
        let current = self.settle(step);
        self.index_of(current)
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.steps.get(i))
            .copied()
    }

    /// One-based position and total.
    pub fn progress(&self, step: CreationStep) -> (usize, usize) {
        let index = self.index_of(self.settle(step)).unwrap_or(0);
        (index + 1, self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::Ability;
    use crate::choice::{ChoiceOption, ChoiceType};
    use crate::compendium::{ClassRef, LevelProgression, Modifier, RaceRef, SubraceRef};
    use crate::ids::{ClassId, RaceId, SubraceId};

    fn level_one(cantrips: u8, spells: u8) -> Vec<LevelProgression> {
        vec![LevelProgression {
            level: 1,
            cantrips_known: cantrips,
            spells_known: spells,
            spell_slots: Vec::new(),
        }]
    }

    fn draft_with(race: RaceRef, class: ClassRef) -> DraftCharacter {
        let mut draft = DraftCharacter::new();
        draft.select_race(race);
        draft.select_class(class);
        draft
    }

    fn elf() -> RaceRef {
        RaceRef::new(RaceId::new(3), "Elf").with_subraces(vec![
            SubraceRef::new(SubraceId::new(31), "High Elf"),
            SubraceRef::new(SubraceId::new(32), "Wood Elf"),
        ])
    }

    fn fighter() -> ClassRef {
        ClassRef::new(ClassId::new(5), "Fighter", "fighter").with_progression(level_one(0, 0))
    }

    fn paladin() -> ClassRef {
        ClassRef::new(ClassId::new(7), "Paladin", "paladin")
            .with_spellcasting(Ability::Charisma)
            .with_progression(level_one(0, 0))
    }

    fn wizard() -> ClassRef {
        ClassRef::new(ClassId::new(12), "Wizard", "wizard")
            .with_spellcasting(Ability::Intelligence)
            .with_progression(level_one(3, 6))
    }

    fn cantrip_choice() -> PendingChoice {
        PendingChoice::new(
            "spell|class|12|1|cantrips",
            ChoiceType::Spell,
            ChoiceSource::Class,
            3,
        )
        .with_subtype("cantrip")
    }

    #[test]
    fn empty_draft_has_spine_only() {
        let steps = creation_steps(&DraftCharacter::new(), &[]);
        assert_eq!(
            steps,
            vec![
                CreationStep::Name,
                CreationStep::Race,
                CreationStep::Class,
                CreationStep::Abilities,
                CreationStep::Background,
                CreationStep::Equipment,
                CreationStep::Review,
            ]
        );
    }

    #[test]
    fn subrace_step_follows_race_subraces() {
        let base = draft_with(RaceRef::new(RaceId::new(4), "Elf (base)"), fighter());
        let with_subraces = draft_with(elf(), fighter());

        let base_steps = creation_steps(&base, &[]);
        let subrace_steps = creation_steps(&with_subraces, &[]);
        assert!(!base_steps.contains(&CreationStep::Subrace));
        assert_eq!(subrace_steps[2], CreationStep::Subrace);
        assert_eq!(subrace_steps.len(), base_steps.len() + 1);
    }

    #[test]
    fn half_caster_gets_no_spell_step() {
        let steps = creation_steps(&draft_with(elf(), paladin()), &[]);
        assert!(!steps.contains(&CreationStep::Spells));

        let steps = creation_steps(&draft_with(elf(), wizard()), &[]);
        assert!(steps.contains(&CreationStep::Spells));
    }

    #[test]
    fn bonus_feat_modifier_adds_feat_step() {
        let race = RaceRef::new(RaceId::new(50), "Custom Lineage")
            .with_modifier(Modifier::new("Bonus Feat"));
        let steps = creation_steps(&draft_with(race, fighter()), &[]);
        let feat = steps.iter().position(|s| *s == CreationStep::Feat);
        let equipment = steps.iter().position(|s| *s == CreationStep::Equipment);
        assert!(feat.is_some() && feat < equipment);
    }

    #[test]
    fn answered_reference_groups_still_add_proficiency_step() {
        let class = fighter().with_proficiency_group(ProficiencyGroup::new(
            "skills",
            2,
            vec![ChoiceOption::new("athletics", "Athletics")],
        ));
        let draft = draft_with(elf(), class);
        assert!(creation_steps(&draft, &[]).contains(&CreationStep::ProficiencyChoices));

        let choices = choices_for_step(CreationStep::ProficiencyChoices, &draft, &[]);
        assert_eq!(choices.len(), 1);
        assert!(choices[0].is_satisfied());
    }

    #[test]
    fn pending_group_is_not_duplicated_by_reference_group() {
        let class = fighter().with_proficiency_group(ProficiencyGroup::new("skills", 2, Vec::new()));
        let draft = draft_with(elf(), class);
        let pending = vec![PendingChoice::new(
            "proficiency|class|5|1|skills",
            ChoiceType::Proficiency,
            ChoiceSource::Class,
            2,
        )];
        let choices = choices_for_step(CreationStep::ProficiencyChoices, &draft, &pending);
        assert_eq!(choices.len(), 1);
        assert!(!choices[0].is_satisfied());
    }

    #[test]
    fn spell_choices_fall_back_for_non_casters() {
        let pending = vec![cantrip_choice()];
        let fighter_draft = draft_with(elf(), fighter());
        assert_eq!(
            step_for_choice(&pending[0], &fighter_draft),
            CreationStep::ProficiencyChoices
        );
        assert!(creation_steps(&fighter_draft, &pending).contains(&CreationStep::ProficiencyChoices));

        let wizard_draft = draft_with(elf(), wizard());
        assert_eq!(step_for_choice(&pending[0], &wizard_draft), CreationStep::Spells);
    }

    #[test]
    fn settle_falls_back_to_nearest_earlier_step() {
        let plan = StepPlan::new(creation_steps(&draft_with(elf(), fighter()), &[]));
        assert_eq!(plan.settle(CreationStep::Subrace), CreationStep::Subrace);

        let without = StepPlan::new(creation_steps(
            &draft_with(RaceRef::new(RaceId::new(9), "Dragonborn"), fighter()),
            &[],
        ));
        assert_eq!(without.settle(CreationStep::Subrace), CreationStep::Race);
        assert_eq!(without.next(CreationStep::Subrace), Some(CreationStep::Class));
    }

    #[test]
    fn progress_and_neighbours() {
        let plan = StepPlan::new(creation_steps(&DraftCharacter::new(), &[]));
        assert_eq!(plan.progress(CreationStep::Name), (1, 7));
        assert_eq!(plan.previous(CreationStep::Name), None);
        assert_eq!(plan.next(CreationStep::Review), None);
        assert_eq!(plan.previous(CreationStep::Review), Some(CreationStep::Equipment));
    }
}
