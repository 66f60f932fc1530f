use serde::Serialize;

use crate::common::collections::HashSet;
use crate::model::host::GroupId;

/// Display order of groups, independent of host tree order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GroupOrder {
    ids: Vec<GroupId>,
}

impl GroupOrder {
    /// Builds an order from persisted ids, dropping repeats.
    pub fn from_persisted(ids: Vec<GroupId>) -> Self {
        let mut seen = HashSet::default();
        GroupOrder {
            ids: ids.into_iter().filter(|id| seen.insert(id.clone())).collect(),
        }
    }

    pub fn ids(&self) -> &[GroupId] { &self.ids }

    pub fn position(&self, id: &GroupId) -> Option<usize> { self.ids.iter().position(|g| g == id) }

    /// Known ids keep their relative order, unknown ones go to the end in the
    /// order given, vanished ones are dropped. Returns whether anything moved.
    pub fn merge<'a>(&mut self, current: impl IntoIterator<Item = &'a GroupId>) -> bool {
        let merged = merge_order(&self.ids, current);
        let changed = merged != self.ids;
        self.ids = merged;
        changed
    }

    /// Exchanges two ids. No-op unless both are present.
    pub fn swap(&mut self, a: &GroupId, b: &GroupId) -> bool {
        match (self.position(a), self.position(b)) {
            (Some(i), Some(j)) if i != j => {
                self.ids.swap(i, j);
                true
            }
            _ => false,
        }
    }

    pub fn move_to_end(&mut self, id: &GroupId) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let id = self.ids.remove(idx);
        self.ids.push(id);
        true
    }
}

pub fn merge_order<'a>(
    previous: &[GroupId],
    current: impl IntoIterator<Item = &'a GroupId>,
) -> Vec<GroupId> {
    let mut current_set: HashSet<&GroupId> = HashSet::default();
    let mut current_ordered = Vec::new();
    for id in current {
        if current_set.insert(id) {
            current_ordered.push(id);
        }
    }

    let mut seen: HashSet<&GroupId> = HashSet::default();
    let mut merged: Vec<GroupId> = previous
        .iter()
        .filter(|id| current_set.contains(id) && seen.insert(*id))
        .cloned()
        .collect();
    merged.extend(current_ordered.into_iter().filter(|id| seen.insert(*id)).cloned());
    merged
}
