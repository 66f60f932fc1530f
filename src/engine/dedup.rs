//! Collapsing leaves that show the same content.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use tracing::{debug, info, trace};

use super::moves::move_leaf;
use crate::common::collections::HashMap;
use crate::model::host::{
    ContentKey, FocusMode, GroupId, HostTree, LeafId, LeafState, Region, SubLocation,
};

/// "Open at" requests waiting for the leaf that will end up showing a key.
#[derive(Debug, Default)]
pub struct PendingJumps {
    jumps: HashMap<ContentKey, SubLocation>,
}

impl PendingJumps {
    pub fn register(&mut self, key: ContentKey, location: SubLocation) {
        self.jumps.insert(key, location);
    }

    pub fn take(&mut self, key: &ContentKey) -> Option<SubLocation> { self.jumps.remove(key) }

    pub fn is_empty(&self) -> bool { self.jumps.is_empty() }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    pub kept: LeafId,
    pub closed: Vec<LeafId>,
}

/// Closes a leaf, flagging the view first so the host stops loading it.
pub fn close_leaf_safely(host: &mut impl HostTree, leaf: &LeafId) -> bool {
    match host.leaf_mut(leaf) {
        Some(state) => state.closing = true,
        None => return false,
    }
    host.detach_leaf(leaf)
}

/// Most recently touched first, pinned after unpinned. Ties keep input order.
fn sort_candidates(candidates: &mut [(LeafId, LeafState)]) {
    candidates.sort_by_key(|(_, s)| (s.pinned, Reverse(s.last_touched())));
}

/// Reduces one set of duplicates to a single leaf.
///
/// Keeps the least recently touched unpinned leaf. When a more recently
/// touched duplicate exists, the kept leaf takes over its history, tree
/// position and view state before that duplicate is closed. Pinned leaves are
/// never closed.
fn deduplicate_set(host: &mut impl HostTree, leaves: &[LeafId]) -> Option<DedupOutcome> {
    let mut candidates: Vec<(LeafId, LeafState)> = leaves
        .iter()
        .filter_map(|l| host.leaf(l).map(|s| (l.clone(), s.clone())))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    sort_candidates(&mut candidates);

    let keep_idx = candidates
        .iter()
        .rposition(|(_, s)| !s.pinned)
        .unwrap_or(candidates.len() - 1);
    let keep = candidates[keep_idx].0.clone();

    let latest_old = candidates
        .iter()
        .enumerate()
        .find(|(i, (_, s))| *i != keep_idx && !s.pinned && s.last_touched() > 0)
        .map(|(_, (id, state))| (id.clone(), state.clone()));

    if let Some((old_id, old_state)) = &latest_old {
        trace!(?keep, latest = ?old_id, "kept leaf takes over most recent duplicate");
        if let Some(state) = host.leaf_mut(&keep) {
            if !old_state.ephemeral {
                state.ephemeral = false;
            }
            state.history = old_state.history.clone();
        }
        move_leaf(host, &keep, old_id);
        if let Some(state) = host.leaf_mut(&keep) {
            state.view = old_state.view.clone();
        }
    }

    let mut closed = Vec::new();
    for (id, state) in &candidates {
        if *id == keep || state.pinned {
            continue;
        }
        if close_leaf_safely(host, id) {
            closed.push(id.clone());
        }
    }
    Some(DedupOutcome { kept: keep, closed })
}

/// Deduplicates `candidates`, all showing `key`.
///
/// With `same_group_only` each group is handled on its own. The returned
/// outcome is the one for the group holding the active leaf, or the first
/// group otherwise. `focus` asks for the kept leaf to become active.
pub fn deduplicate(
    host: &mut impl HostTree,
    jumps: &mut PendingJumps,
    key: &ContentKey,
    candidates: &[LeafId],
    same_group_only: bool,
    focus: bool,
) -> Option<DedupOutcome> {
    let mut sets: Vec<(Option<GroupId>, Vec<LeafId>)> = Vec::new();
    for leaf in candidates {
        let group = if same_group_only { host.parent_of(leaf) } else { None };
        match sets.iter_mut().find(|(g, _)| *g == group) {
            Some((_, set)) => set.push(leaf.clone()),
            None => sets.push((group, vec![leaf.clone()])),
        }
    }

    let active_group = host.active_leaf().and_then(|a| host.parent_of(&a));
    let mut chosen: Option<DedupOutcome> = None;
    let mut closed_any = false;
    for (group, set) in sets {
        let Some(outcome) = deduplicate_set(host, &set) else {
            continue;
        };
        closed_any |= !outcome.closed.is_empty();
        if !outcome.closed.is_empty() {
            debug!(?key, ?group, kept = ?outcome.kept, closed = ?outcome.closed, "deduplicated");
        }
        let prefer = same_group_only && group.is_some() && group == active_group;
        if chosen.is_none() || prefer {
            chosen = Some(outcome);
        }
    }
    let outcome = chosen?;

    if let Some(location) = jumps.take(key) {
        host.open_sub_location(&outcome.kept, &location);
    }
    if focus && closed_any && !host.hover_preview_owns_focus() {
        host.set_active_leaf(&outcome.kept, FocusMode::Passive);
    }
    Some(outcome)
}

/// Deduplicates every content key open in the root and floating regions.
///
/// The active leaf's key is handled last, and only that pass may move focus.
pub fn deduplicate_existing_tabs(
    host: &mut impl HostTree,
    jumps: &mut PendingJumps,
    same_group_only: bool,
) -> Vec<DedupOutcome> {
    let mut by_key: BTreeMap<ContentKey, Vec<LeafId>> = BTreeMap::new();
    for region in [Region::Root, Region::Floating] {
        for leaf in host.leaves_in(region) {
            host.materialize(&leaf);
            if let Some(key) = host.leaf(&leaf).and_then(LeafState::content_key) {
                by_key.entry(key).or_default().push(leaf);
            }
        }
    }

    let active_key = host
        .active_leaf()
        .and_then(|a| host.leaf(&a).and_then(LeafState::content_key));
    let mut outcomes = Vec::new();
    for (key, leaves) in &by_key {
        if Some(key) == active_key.as_ref() || leaves.len() < 2 {
            continue;
        }
        outcomes.extend(deduplicate(host, jumps, key, leaves, same_group_only, false));
    }
    if let Some(key) = &active_key
        && let Some(leaves) = by_key.get(key)
        && leaves.len() > 1
    {
        // Leaves may have been closed by earlier passes.
        let alive: Vec<_> = leaves.iter().filter(|l| host.leaf(l).is_some()).cloned().collect();
        outcomes.extend(deduplicate(host, jumps, key, &alive, same_group_only, true));
    }
    let closed: usize = outcomes.iter().map(|o| o.closed.len()).sum();
    if closed > 0 {
        info!(closed, "closed duplicate tabs");
        host.notify_layout_changed();
    }
    outcomes
}
