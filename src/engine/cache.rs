//! Derived group → leaves index, rebuilt from the host tree.

use serde::Serialize;
use tracing::{debug, trace};

use crate::common::collections::HashSet;
use crate::model::host::{GroupId, GroupKind, HostTree, LeafId, Region};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CacheEntry {
    pub group_type: GroupKind,
    /// Live group the leaves were found in. For the sidebars this is the first
    /// group seen in that region.
    pub group: Option<GroupId>,
    pub leaves: Vec<LeafId>,
}

/// Immutable result of one reconciliation pass, in traversal order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CacheSnapshot {
    entries: Vec<(GroupId, CacheEntry)>,
}

impl CacheSnapshot {
    pub fn get(&self, id: &GroupId) -> Option<&CacheEntry> {
        self.entries.iter().find(|(g, _)| g == id).map(|(_, e)| e)
    }

    pub fn contains(&self, id: &GroupId) -> bool { self.get(id).is_some() }

    pub fn group_ids(&self) -> impl Iterator<Item = &GroupId> { self.entries.iter().map(|(g, _)| g) }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupId, &CacheEntry)> {
        self.entries.iter().map(|(g, e)| (g, e))
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Cache id of the entry holding `leaf`.
    pub fn group_of(&self, leaf: &LeafId) -> Option<&GroupId> {
        self.entries.iter().find(|(_, e)| e.leaves.contains(leaf)).map(|(g, _)| g)
    }

    fn entry_mut(&mut self, id: &GroupId) -> &mut CacheEntry {
        let idx = match self.entries.iter().position(|(g, _)| g == id) {
            Some(idx) => idx,
            None => {
                self.entries.push((id.clone(), CacheEntry::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub added: Vec<GroupId>,
    pub dropped: Vec<GroupId>,
}

impl ReconcileOutcome {
    pub fn is_unchanged(&self) -> bool { self.added.is_empty() && self.dropped.is_empty() }
}

/// Owns the latest snapshot and knows how to rebuild it.
#[derive(Debug, Default)]
pub struct Cache {
    snapshot: CacheSnapshot,
}

impl Cache {
    pub fn new() -> Self { Self::default() }

    pub fn snapshot(&self) -> &CacheSnapshot { &self.snapshot }

    /// Rebuilds the snapshot from the live tree.
    ///
    /// `now` stamps leaves the engine sees for the first time. Leaves whose
    /// parent is momentarily missing are skipped until the next pass.
    pub fn reconcile(&mut self, host: &mut impl HostTree, now: u64) -> ReconcileOutcome {
        let mut next = CacheSnapshot::default();

        for region in Region::TRAVERSAL_ORDER {
            for leaf in host.leaves_in(region) {
                let Some(parent) = host.parent_of(&leaf) else {
                    trace!(?leaf, "skipping leaf without parent");
                    continue;
                };
                let id = region.fixed_cache_id().unwrap_or_else(|| parent.clone());
                if let Some(state) = host.leaf_mut(&leaf)
                    && state.creation_time.is_none()
                {
                    state.creation_time = Some(now);
                }
                let entry = next.entry_mut(&id);
                entry.group_type = region.group_kind();
                entry.group.get_or_insert(parent);
                entry.leaves.push(leaf);
            }
        }

        let before: HashSet<&GroupId> = self.snapshot.group_ids().collect();
        let after: HashSet<&GroupId> = next.group_ids().collect();
        let outcome = ReconcileOutcome {
            added: next.group_ids().filter(|g| !before.contains(g)).cloned().collect(),
            dropped: self.snapshot.group_ids().filter(|g| !after.contains(g)).cloned().collect(),
        };
        if !outcome.is_unchanged() {
            debug!(added = ?outcome.added, dropped = ?outcome.dropped, "cache groups changed");
        }
        self.snapshot = next;
        outcome
    }
}
