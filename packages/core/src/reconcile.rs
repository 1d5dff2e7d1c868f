// ABOUTME: Component reconciliation for project state
// ABOUTME: Merges newly identified components into an existing list without duplicates

use std::collections::HashSet;

use crate::types::{Component, ComponentInput};

/// Result of merging incoming components into an existing list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged: Vec<Component>,
    pub added: usize,
}

impl MergeOutcome {
    /// True when the merge produced something worth persisting.
    pub fn changed(&self) -> bool {
        self.added > 0
    }
}

/// Append every incoming component whose identity is not yet present.
///
/// Existing entries are kept untouched and in order. Incoming entries keep
/// their first-appearance order, and an identity that repeats within the
/// incoming list is only appended once.
pub fn merge_components<I>(existing: &[Component], incoming: I) -> MergeOutcome
where
    I: IntoIterator,
    I::Item: Into<ComponentInput>,
{
    let mut seen: HashSet<String> = existing.iter().map(Component::identity).collect();
    let mut merged = existing.to_vec();
    let mut added = 0;

    for component in incoming
        .into_iter()
        .filter_map(|item| item.into().normalize())
    {
        if seen.insert(component.identity()) {
            merged.push(component);
            added += 1;
        }
    }

    MergeOutcome { merged, added }
}
