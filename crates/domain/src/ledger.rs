//! Local Selection Ledger.
//!
//! In-progress picks for the active step that have not been sent to the
//! backend yet. Plain choices live in [`SelectionLedger`]; equipment
//! choices, which nest item picks under a chosen bundle, live in the
//! two-level [`EquipmentLedger`].

use std::collections::{BTreeMap, BTreeSet};

use crate::choice::{BundleItem, ChoiceKey, EquipmentBundle, OptionId, PendingChoice};
use crate::draft::EquipmentEntry;
use crate::error::DomainError;
use crate::ids::ItemId;

/// Picks for one choice.
///
/// Cardinality never exceeds `capacity`; adding beyond it is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    picks: BTreeSet<OptionId>,
    capacity: usize,
    touched: bool,
}

impl Selection {
    pub fn new(capacity: usize) -> Self {
        Self {
            picks: BTreeSet::new(),
            capacity,
            touched: false,
        }
    }

    /// Pre-filled from persisted picks; not counted as a local edit.
    pub fn seeded(picks: impl IntoIterator<Item = OptionId>, capacity: usize) -> Self {
        Self {
            picks: picks.into_iter().take(capacity).collect(),
            capacity,
            touched: false,
        }
    }

    /// Add or remove `option`. Returns whether membership changed.
    pub fn toggle(&mut self, option: OptionId) -> bool {
        if self.picks.remove(&option) {
            self.touched = true;
            return true;
        }
        if self.picks.len() >= self.capacity {
            return false;
        }
        self.picks.insert(option);
        self.touched = true;
        true
    }

    /// Replace all picks with `option` (single-select choices).
    pub fn select_only(&mut self, option: OptionId) {
        if self.capacity == 0 {
            return;
        }
        self.picks.clear();
        self.picks.insert(option);
        self.touched = true;
    }

    pub fn contains(&self, option: &OptionId) -> bool {
        self.picks.contains(option)
    }

    pub fn picks(&self) -> impl Iterator<Item = &OptionId> {
        self.picks.iter()
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// A local edit that should override the persisted answer. An entry
    /// emptied by the user counts as untouched.
    pub fn is_touched(&self) -> bool {
        self.touched && !self.picks.is_empty()
    }
}

fn capacity_of(choice: &PendingChoice) -> usize {
    usize::try_from(choice.quantity).unwrap_or(usize::MAX)
}

/// Per-step map of choice key to in-progress picks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionLedger {
    entries: BTreeMap<ChoiceKey, Selection>,
}

impl SelectionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry from the choice's persisted picks unless one exists.
    pub fn seed(&mut self, choice: &PendingChoice) {
        self.entries
            .entry(choice.key.clone())
            .or_insert_with(|| Selection::seeded(choice.selected.iter().cloned(), capacity_of(choice)));
    }

    /// Toggle `option` on `choice`. Options the choice does not offer are
    /// ignored. Returns whether membership changed.
    pub fn toggle(&mut self, choice: &PendingChoice, option: OptionId) -> bool {
        if !choice.options.allows(&option) {
            return false;
        }
        self.entry(choice).toggle(option)
    }

    /// Replace the picks of a single-select choice.
    pub fn select_only(&mut self, choice: &PendingChoice, option: OptionId) -> bool {
        if !choice.options.allows(&option) {
            return false;
        }
        self.entry(choice).select_only(option);
        true
    }

    fn entry(&mut self, choice: &PendingChoice) -> &mut Selection {
        self.entries
            .entry(choice.key.clone())
            .or_insert_with(|| Selection::new(capacity_of(choice)))
    }

    pub fn get(&self, key: &ChoiceKey) -> Option<&Selection> {
        self.entries.get(key)
    }

    pub fn is_touched(&self, key: &ChoiceKey) -> bool {
        self.get(key).is_some_and(Selection::is_touched)
    }

    /// Entries carrying a local edit with at least one pick.
    pub fn touched(&self) -> impl Iterator<Item = (&ChoiceKey, &Selection)> {
        self.entries.iter().filter(|(_, s)| s.is_touched())
    }

    pub fn remove(&mut self, key: &ChoiceKey) -> Option<Selection> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The bundle picked for one equipment choice plus concrete item picks for
/// its category slots, keyed by item index within the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentSelection {
    pub option: OptionId,
    pub items: BTreeMap<usize, ItemId>,
}

impl EquipmentSelection {
    pub fn new(option: OptionId) -> Self {
        Self {
            option,
            items: BTreeMap::new(),
        }
    }

    /// Every category slot of `bundle` has a concrete pick.
    pub fn is_fully_specified(&self, bundle: &EquipmentBundle) -> bool {
        bundle.id == self.option && bundle.category_slots().all(|i| self.items.contains_key(&i))
    }

    /// Turn the chosen bundle into rows to persist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` when a category slot has no pick.
    pub fn resolve(&self, bundle: &EquipmentBundle) -> Result<Vec<EquipmentEntry>, DomainError> {
        bundle
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                BundleItem::Catalog {
                    item_id, quantity, ..
                } => Ok(EquipmentEntry::Catalog {
                    item_id: *item_id,
                    quantity: *quantity,
                }),
                BundleItem::Category { name, quantity, .. } => self
                    .items
                    .get(&index)
                    .map(|item_id| EquipmentEntry::Catalog {
                        item_id: *item_id,
                        quantity: *quantity,
                    })
                    .ok_or_else(|| {
                        DomainError::validation(format!("Pick an item for '{}'", name))
                    }),
                BundleItem::Flavor { name, quantity } => Ok(EquipmentEntry::Custom {
                    name: name.clone(),
                    quantity: *quantity,
                }),
            })
            .collect()
    }
}

/// Two-level ledger: choice key, then chosen bundle with item picks.
///
/// Changing the bundle of a choice drops its item picks as one subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquipmentLedger {
    entries: BTreeMap<ChoiceKey, EquipmentSelection>,
}

impl EquipmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick a bundle. Returns `true` if the bundle changed.
    pub fn select_option(&mut self, key: &ChoiceKey, option: OptionId) -> bool {
        match self.entries.get(key) {
            Some(existing) if existing.option == option => false,
            _ => {
                self.entries
                    .insert(key.clone(), EquipmentSelection::new(option));
                true
            }
        }
    }

    /// Pick the concrete item for a category slot of the chosen bundle.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` when no bundle is chosen yet.
    pub fn pick_item(
        &mut self,
        key: &ChoiceKey,
        item_index: usize,
        item_id: ItemId,
    ) -> Result<(), DomainError> {
        let selection = self
            .entries
            .get_mut(key)
            .ok_or_else(|| DomainError::validation("Choose an equipment option first"))?;
        selection.items.insert(item_index, item_id);
        Ok(())
    }

    pub fn get(&self, key: &ChoiceKey) -> Option<&EquipmentSelection> {
        self.entries.get(key)
    }

    pub fn is_dirty(&self, key: &ChoiceKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn any_dirty(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChoiceKey, &EquipmentSelection)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
