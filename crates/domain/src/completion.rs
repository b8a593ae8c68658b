//! Completion Evaluator.
//!
//! Decides whether each choice group is done and whether a step may
//! advance. Local edits override persisted answers, untouched groups keep
//! their persisted answer, and a half-finished local edit never counts as
//! complete.

use std::collections::{BTreeMap, BTreeSet};

use crate::choice::{BundleItem, ChoiceKey, ChoiceKind, ChoiceOptions, PendingChoice};
use crate::draft::{EquipmentEntry, EquipmentRow};
use crate::ids::ItemId;
use crate::ledger::{EquipmentLedger, EquipmentSelection, Selection, SelectionLedger};

/// Completion of a single group.
pub fn is_group_complete(choice: &PendingChoice, entry: Option<&Selection>) -> bool {
    match entry.filter(|e| e.is_touched()) {
        Some(local) => local.len() == usize::try_from(choice.quantity).unwrap_or(usize::MAX),
        None => choice.is_satisfied(),
    }
}

/// Per-group results plus the step-level conjunction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepCompletion {
    pub groups: Vec<GroupCompletion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCompletion {
    pub key: ChoiceKey,
    pub required: bool,
    pub complete: bool,
}

impl StepCompletion {
    /// Optional groups never block.
    pub fn is_complete(&self) -> bool {
        self.groups.iter().all(|g| g.complete || !g.required)
    }

    pub fn group(&self, key: &ChoiceKey) -> Option<bool> {
        self.groups.iter().find(|g| &g.key == key).map(|g| g.complete)
    }

    pub fn incomplete(&self) -> impl Iterator<Item = &ChoiceKey> {
        self.groups
            .iter()
            .filter(|g| g.required && !g.complete)
            .map(|g| &g.key)
    }
}

/// Evaluate plain (non-equipment) groups.
pub fn evaluate<'a>(
    choices: impl IntoIterator<Item = &'a PendingChoice>,
    ledger: &SelectionLedger,
) -> StepCompletion {
    StepCompletion {
        groups: choices
            .into_iter()
            .map(|choice| GroupCompletion {
                key: choice.key.clone(),
                required: choice.required,
                complete: is_group_complete(choice, ledger.get(&choice.key)),
            })
            .collect(),
    }
}

/// Persisted selections rebuilt from the backend's bundle letters and the
/// character's equipment rows.
///
/// Rows whose item is a fixed catalog item of some bundle are skipped; the
/// rest fill category slots of the selected bundles in row order. A slot
/// left without a row stays unpicked.
pub fn persisted_equipment_selections(
    choices: &[PendingChoice],
    rows: &[EquipmentRow],
) -> BTreeMap<ChoiceKey, EquipmentSelection> {
    let fixed: BTreeSet<ItemId> = choices
        .iter()
        .filter_map(|c| match &c.options {
            ChoiceOptions::Bundles(bundles) => Some(bundles),
            _ => None,
        })
        .flatten()
        .flat_map(|bundle| &bundle.items)
        .filter_map(|item| match item {
            BundleItem::Catalog { item_id, .. } => Some(*item_id),
            _ => None,
        })
        .collect();
    let mut picked = rows.iter().filter_map(|row| match &row.entry {
        EquipmentEntry::Catalog { item_id, .. } if !fixed.contains(item_id) => Some(*item_id),
        _ => None,
    });

    let mut selections = BTreeMap::new();
    for choice in choices {
        let Some(option) = choice.selected.first() else {
            continue;
        };
        let mut selection = EquipmentSelection::new(option.clone());
        if let Some(bundle) = choice.options.bundle(option) {
            for slot in bundle.category_slots() {
                let Some(item_id) = picked.next() else {
                    break;
                };
                selection.items.insert(slot, item_id);
            }
        }
        selections.insert(choice.key.clone(), selection);
    }
    selections
}

/// The selection a group would be saved with: the local edit if any,
/// otherwise the persisted one.
pub fn effective_equipment_selection(
    choice: &PendingChoice,
    ledger: &EquipmentLedger,
    persisted: &BTreeMap<ChoiceKey, EquipmentSelection>,
) -> Option<EquipmentSelection> {
    ledger
        .get(&choice.key)
        .or_else(|| persisted.get(&choice.key))
        .cloned()
}

fn is_fully_specified(choice: &PendingChoice, selection: Option<&EquipmentSelection>) -> bool {
    selection.is_some_and(|s| {
        choice
            .options
            .bundle(&s.option)
            .is_some_and(|bundle| s.is_fully_specified(bundle))
    })
}

/// Evaluate equipment groups.
///
/// With no local edits an untouched group keeps its persisted answer.
/// Once any group is edited the whole collection is rewritten on save, so
/// every group needs a fully specified selection; untouched groups take
/// their category picks from `rows`.
pub fn evaluate_equipment(
    choices: &[PendingChoice],
    ledger: &EquipmentLedger,
    rows: &[EquipmentRow],
) -> StepCompletion {
    let rewriting = ledger.any_dirty();
    let persisted = if rewriting {
        persisted_equipment_selections(choices, rows)
    } else {
        BTreeMap::new()
    };
    StepCompletion {
        groups: choices
            .iter()
            .map(|choice| {
                let complete = if ledger.is_dirty(&choice.key) || rewriting {
                    let selection = effective_equipment_selection(choice, ledger, &persisted);
                    is_fully_specified(choice, selection.as_ref())
                } else {
                    choice.is_satisfied()
                };
                GroupCompletion {
                    key: choice.key.clone(),
                    required: choice.required,
                    complete,
                }
            })
            .collect(),
    }
}

/// Whether every required choice of `kind` across the character is done.
pub fn all_of_kind_complete(
    choices: &[PendingChoice],
    ledger: &SelectionLedger,
    kind: ChoiceKind,
) -> bool {
    evaluate(choices.iter().filter(|c| c.kind() == kind), ledger).is_complete()
}
