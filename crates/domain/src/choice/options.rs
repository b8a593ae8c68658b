//! Legal options of a pending choice.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::ItemId;

/// Identifier of one selectable option (skill slug, spell id, bundle letter...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(String);

impl OptionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OptionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OptionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A plain selectable option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub id: OptionId,
    pub name: String,
    pub description: Option<String>,
}

impl ChoiceOption {
    pub fn new(id: impl Into<OptionId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One item inside an equipment bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleItem {
    /// A concrete catalog item.
    Catalog {
        item_id: ItemId,
        name: String,
        quantity: u32,
    },
    /// "Any martial weapon": the user must pick a concrete catalog item.
    Category {
        category: String,
        name: String,
        quantity: u32,
    },
    /// Free-text item with no catalog entry ("a trinket"); persisted by name.
    Flavor { name: String, quantity: u32 },
}

impl BundleItem {
    pub fn name(&self) -> &str {
        match self {
            BundleItem::Catalog { name, .. }
            | BundleItem::Category { name, .. }
            | BundleItem::Flavor { name, .. } => name,
        }
    }

    pub fn quantity(&self) -> u32 {
        match self {
            BundleItem::Catalog { quantity, .. }
            | BundleItem::Category { quantity, .. }
            | BundleItem::Flavor { quantity, .. } => *quantity,
        }
    }

    pub fn needs_pick(&self) -> bool {
        matches!(self, BundleItem::Category { .. })
    }
}

/// A selectable equipment bundle ("(a) a mace or (b) a warhammer").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentBundle {
    pub id: OptionId,
    pub label: String,
    pub items: Vec<BundleItem>,
}

impl EquipmentBundle {
    pub fn new(id: impl Into<OptionId>, label: impl Into<String>, items: Vec<BundleItem>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            items,
        }
    }

    /// Indexes of items that need a concrete pick.
    pub fn category_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.needs_pick())
            .map(|(index, _)| index)
    }
}

/// The legal options of a choice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChoiceOptions {
    /// Options inlined in the pending-choice payload.
    Inline(Vec<ChoiceOption>),
    /// Equipment bundles.
    Bundles(Vec<EquipmentBundle>),
    /// Options must be fetched from a follow-up endpoint.
    Deferred { endpoint: String },
    /// No usable options (absent or malformed); rendered as "no options".
    #[default]
    Unavailable,
}

impl ChoiceOptions {
    pub fn option_ids(&self) -> Vec<&OptionId> {
        match self {
            ChoiceOptions::Inline(options) => options.iter().map(|o| &o.id).collect(),
            ChoiceOptions::Bundles(bundles) => bundles.iter().map(|b| &b.id).collect(),
            ChoiceOptions::Deferred { .. } | ChoiceOptions::Unavailable => Vec::new(),
        }
    }

    /// Whether `id` is a legal option. Deferred options cannot be checked
    /// locally and are accepted.
    pub fn allows(&self, id: &OptionId) -> bool {
        match self {
            ChoiceOptions::Deferred { .. } => true,
            _ => self.option_ids().into_iter().any(|o| o == id),
        }
    }

    pub fn bundle(&self, id: &OptionId) -> Option<&EquipmentBundle> {
        match self {
            ChoiceOptions::Bundles(bundles) => bundles.iter().find(|b| &b.id == id),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ChoiceOptions::Inline(options) => options.is_empty(),
            ChoiceOptions::Bundles(bundles) => bundles.is_empty(),
            ChoiceOptions::Deferred { .. } => false,
            ChoiceOptions::Unavailable => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mace_or_warhammer() -> ChoiceOptions {
        ChoiceOptions::Bundles(vec![
            EquipmentBundle::new(
                "a",
                "a mace",
                vec![BundleItem::Catalog {
                    item_id: ItemId::new(1),
                    name: "Mace".into(),
                    quantity: 1,
                }],
            ),
            EquipmentBundle::new(
                "b",
                "a warhammer",
                vec![BundleItem::Catalog {
                    item_id: ItemId::new(2),
                    name: "Warhammer".into(),
                    quantity: 1,
                }],
            ),
        ])
    }

    #[test]
    fn bundles_expose_their_letters() {
        let options = mace_or_warhammer();
        assert!(options.allows(&OptionId::from("a")));
        assert!(!options.allows(&OptionId::from("c")));
        assert_eq!(
            options
                .bundle(&OptionId::from("b"))
                .map(|b| b.label.as_str()),
            Some("a warhammer")
        );
    }

    #[test]
    fn category_slots_only_lists_placeholders() {
        let bundle = EquipmentBundle::new(
            "a",
            "a martial weapon and a trinket",
            vec![
                BundleItem::Category {
                    category: "martial-weapons".into(),
                    name: "any martial weapon".into(),
                    quantity: 1,
                },
                BundleItem::Flavor {
                    name: "a trinket".into(),
                    quantity: 1,
                },
            ],
        );
        assert_eq!(bundle.category_slots().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn unavailable_allows_nothing() {
        let options = ChoiceOptions::Unavailable;
        assert!(options.is_empty());
        assert!(!options.allows(&OptionId::from("a")));
    }

    #[test]
    fn deferred_allows_anything() {
        let options = ChoiceOptions::Deferred {
            endpoint: "/spells?class=wizard".into(),
        };
        assert!(options.allows(&OptionId::from("fire-bolt")));
        assert!(!options.is_empty());
    }
}
