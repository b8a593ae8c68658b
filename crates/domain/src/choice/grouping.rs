//! Display grouping of pending choices: by source, then by kind.

use std::collections::BTreeMap;

use super::{ChoiceKind, ChoiceSource, PendingChoice};

/// Choices of one kind within a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindGroup<'a> {
    pub kind: ChoiceKind,
    pub choices: Vec<&'a PendingChoice>,
}

/// All choices from one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceGroup<'a> {
    pub source: ChoiceSource,
    pub kinds: Vec<KindGroup<'a>>,
}

impl<'a> SourceGroup<'a> {
    pub fn choices(&self) -> impl Iterator<Item = &'a PendingChoice> + '_ {
        self.kinds.iter().flat_map(|k| k.choices.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.kinds.iter().map(|k| k.choices.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Group choices by source (class, race, background, subclass feature, feat,
/// then unknown sources alphabetically) and by kind within a source. Input
/// order is kept within a kind.
pub fn group_by_source(choices: &[PendingChoice]) -> Vec<SourceGroup<'_>> {
    let mut by_source: BTreeMap<ChoiceSource, BTreeMap<ChoiceKind, Vec<&PendingChoice>>> =
        BTreeMap::new();

    for choice in choices {
        by_source
            .entry(choice.source.clone())
            .or_default()
            .entry(choice.kind())
            .or_default()
            .push(choice);
    }

    by_source
        .into_iter()
        .map(|(source, kinds)| SourceGroup {
            source,
            kinds: kinds
                .into_iter()
                .map(|(kind, choices)| KindGroup { kind, choices })
                .collect(),
        })
        .collect()
}
