use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::cache::{Cache, CacheSnapshot, ReconcileOutcome};
use super::dedup::{self, DedupOutcome, PendingJumps, close_leaf_safely};
use super::focus_lock::{FocusLock, FocusOutcome, FocusState};
use super::group_order::GroupOrder;
use super::moves;
use super::sort::{SortStrategyName, sort_root_groups};
use crate::common::config::Settings;
use crate::model::host::{ContentKey, GroupId, HostTree, LeafId, LeafState, Region, SubLocation};
use crate::model::store::{KeyValueStore, PersistedState};

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Read-only view handed to the presentation layer between events.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub cache: CacheSnapshot,
    pub group_order: GroupOrder,
    pub sort_strategy: Option<SortStrategyName>,
    pub focus: FocusState,
}

/// Owns every piece of state derived from the host tree.
///
/// The host is passed into each call rather than held, so the engine never
/// keeps a live node across calls.
pub struct TabEngine<S> {
    settings: Settings,
    cache: Cache,
    order: GroupOrder,
    strategy: Option<SortStrategyName>,
    focus: FocusLock,
    jumps: PendingJumps,
    persisted: PersistedState<S>,
}

impl<S: KeyValueStore> TabEngine<S> {
    /// Loads the persisted group order and sort strategy from `store`.
    ///
    /// Unreadable values are logged and replaced by defaults.
    pub fn new(settings: Settings, store: S) -> Self {
        let mut persisted = PersistedState::new(store);
        let order = match persisted.load_group_order() {
            Ok(ids) => GroupOrder::from_persisted(ids),
            Err(e) => {
                error!(error = %e, "failed to load group order");
                GroupOrder::default()
            }
        };
        let stored = match persisted.load_sort_strategy() {
            Ok(name) => name,
            Err(e) => {
                error!(error = %e, "failed to load sort strategy");
                None
            }
        };
        let strategy = match stored {
            Some(name) => name.parse::<SortStrategyName>().ok().or_else(|| {
                warn!(%name, "ignoring unknown persisted sort strategy");
                None
            }),
            None => settings.initial_sort_strategy(),
        };
        debug!(order = ?order.ids(), ?strategy, "engine loaded");
        TabEngine {
            focus: FocusLock::new(settings.focus_lock),
            settings,
            cache: Cache::new(),
            order,
            strategy,
            jumps: PendingJumps::default(),
            persisted,
        }
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn cache(&self) -> &CacheSnapshot { self.cache.snapshot() }

    pub fn group_order(&self) -> &GroupOrder { &self.order }

    pub fn sort_strategy(&self) -> Option<SortStrategyName> { self.strategy }

    pub fn focus(&self) -> &FocusState { self.focus.state() }

    pub fn store(&self) -> &S { self.persisted.store() }

    pub fn into_store(self) -> S { self.persisted.into_store() }

    pub fn set_focus_lock(&mut self, enabled: bool) {
        self.settings.focus_lock = enabled;
        self.focus.set_enabled(enabled);
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            cache: self.cache.snapshot().clone(),
            group_order: self.order.clone(),
            sort_strategy: self.strategy,
            focus: self.focus.state().clone(),
        }
    }

    fn persist_order(&mut self) {
        if let Err(e) = self.persisted.save_group_order(self.order.ids()) {
            error!(error = %e, "failed to persist group order");
        }
    }

    fn persist_sort(&mut self) {
        let name = self.strategy.map(|s| s.to_string());
        if let Err(e) = self.persisted.save_sort_strategy(name.as_deref()) {
            error!(error = %e, "failed to persist sort strategy");
        }
    }

    pub fn reconcile(&mut self, host: &mut impl HostTree) -> ReconcileOutcome {
        self.reconcile_at(host, now_ms())
    }

    /// Rebuilds the cache and merges the group order, persisting it when it
    /// changed.
    pub fn reconcile_at(&mut self, host: &mut impl HostTree, now: u64) -> ReconcileOutcome {
        let outcome = self.cache.reconcile(host, now);
        if self.order.merge(self.cache.snapshot().group_ids()) {
            debug!(order = ?self.order.ids(), "group order changed");
            self.persist_order();
        }
        outcome
    }

    /// Selects a strategy (or none), persists it and sorts right away.
    pub fn set_sort_strategy(
        &mut self,
        host: &mut impl HostTree,
        name: Option<SortStrategyName>,
    ) -> usize {
        info!(?name, "sort strategy set");
        self.strategy = name;
        self.persist_sort();
        self.sort(host)
    }

    /// Applies the current strategy. Without one the host order is left alone.
    pub fn sort(&mut self, host: &mut impl HostTree) -> usize {
        let Some(name) = self.strategy else {
            return 0;
        };
        let changed = sort_root_groups(host, &name.strategy());
        if changed > 0 {
            self.reconcile(host);
        }
        changed
    }

    pub fn swap_group(&mut self, a: &GroupId, b: &GroupId) -> bool {
        if !self.order.swap(a, b) {
            return false;
        }
        debug!(?a, ?b, "swapped groups");
        self.persist_order();
        true
    }

    pub fn move_group_to_end(&mut self, id: &GroupId) -> bool {
        if !self.order.move_to_end(id) {
            return false;
        }
        debug!(?id, "moved group to end");
        self.persist_order();
        true
    }

    pub fn move_leaf(
        &mut self,
        host: &mut impl HostTree,
        source: &LeafId,
        target: &LeafId,
    ) -> bool {
        let moved = moves::move_leaf(host, source, target);
        if moved {
            self.reconcile(host);
        }
        moved
    }

    pub fn move_leaf_to_end(
        &mut self,
        host: &mut impl HostTree,
        source: &LeafId,
        group: &GroupId,
    ) -> bool {
        let moved = moves::move_leaf_to_end(host, source, group);
        if moved {
            self.reconcile(host);
        }
        moved
    }

    pub fn move_leaf_to_new_group(
        &mut self,
        host: &mut impl HostTree,
        source: &LeafId,
    ) -> Option<GroupId> {
        let group = moves::move_leaf_to_new_group(host, source)?;
        self.reconcile(host);
        Some(group)
    }

    pub fn register_pending_jump(&mut self, key: ContentKey, location: SubLocation) {
        self.jumps.register(key, location);
    }

    /// Deduplicates `candidates`, which all show `key`, and focuses the kept
    /// leaf if anything was closed.
    pub fn deduplicate(
        &mut self,
        host: &mut impl HostTree,
        key: &ContentKey,
        candidates: &[LeafId],
        same_group_only: bool,
    ) -> Option<LeafId> {
        let outcome =
            dedup::deduplicate(host, &mut self.jumps, key, candidates, same_group_only, true)?;
        if !outcome.closed.is_empty() {
            host.notify_layout_changed();
            self.reconcile(host);
        }
        Some(outcome.kept)
    }

    pub fn deduplicate_existing_tabs(&mut self, host: &mut impl HostTree) -> Vec<DedupOutcome> {
        let outcomes = dedup::deduplicate_existing_tabs(
            host,
            &mut self.jumps,
            self.settings.dedup_same_group_only,
        );
        if outcomes.iter().any(|o| !o.closed.is_empty()) {
            self.reconcile(host);
        }
        outcomes
    }

    /// A file was opened in `leaf`. Closes other leaves showing the same
    /// content when deduplication is enabled, and returns the surviving leaf.
    pub fn on_file_opened(&mut self, host: &mut impl HostTree, leaf: &LeafId) -> Option<LeafId> {
        if !self.settings.deduplicate_tabs {
            return None;
        }
        host.materialize(leaf);
        let key = host.leaf(leaf).and_then(LeafState::content_key)?;
        let mut candidates = Vec::new();
        for region in [Region::Root, Region::Floating] {
            for other in host.leaves_in(region) {
                host.materialize(&other);
                if host.leaf(&other).and_then(LeafState::content_key).as_ref() == Some(&key) {
                    candidates.push(other);
                }
            }
        }
        if candidates.len() < 2 {
            return Some(leaf.clone());
        }
        let same_group_only = self.settings.dedup_same_group_only;
        self.deduplicate(host, &key, &candidates, same_group_only)
    }

    pub fn on_active_leaf_changed(
        &mut self,
        host: &mut impl HostTree,
        active: Option<LeafId>,
    ) -> FocusOutcome {
        self.focus.on_active_leaf_changed(host, active)
    }

    /// Closes every unpinned leaf of `leaf`'s group except `leaf` itself.
    pub fn close_others(&mut self, host: &mut impl HostTree, leaf: &LeafId) -> Vec<LeafId> {
        let Some(group) = host.parent_of(leaf) else {
            return Vec::new();
        };
        self.close_unpinned(host, &group, Some(leaf))
    }

    /// Closes every unpinned leaf of `group`. The group goes away with its
    /// last leaf.
    pub fn close_group(&mut self, host: &mut impl HostTree, group: &GroupId) -> Vec<LeafId> {
        self.close_unpinned(host, group, None)
    }

    fn close_unpinned(
        &mut self,
        host: &mut impl HostTree,
        group: &GroupId,
        keep: Option<&LeafId>,
    ) -> Vec<LeafId> {
        let children = host.group(group).map(|g| g.children.clone()).unwrap_or_default();
        let mut closed = Vec::new();
        for child in children {
            if Some(&child) == keep || host.leaf(&child).is_none_or(|s| s.pinned) {
                continue;
            }
            if close_leaf_safely(host, &child) {
                closed.push(child);
            }
        }
        if !closed.is_empty() {
            debug!(?group, ?closed, "closed leaves");
            host.notify_layout_changed();
            self.reconcile(host);
        }
        closed
    }

    /// Flips the pin flag, returning the new value. Pin-based strategies are
    /// re-applied.
    pub fn toggle_pin(&mut self, host: &mut impl HostTree, leaf: &LeafId) -> Option<bool> {
        let state = host.leaf_mut(leaf)?;
        state.pinned = !state.pinned;
        let pinned = state.pinned;
        debug!(?leaf, pinned, "toggled pin");
        if self.strategy.is_some_and(SortStrategyName::is_pin_based) {
            self.sort(host);
        }
        Some(pinned)
    }

    pub fn make_leaf_non_ephemeral(&mut self, host: &mut impl HostTree, leaf: &LeafId) -> bool {
        match host.leaf_mut(leaf) {
            Some(state) => {
                state.ephemeral = false;
                true
            }
            None => false,
        }
    }

    /// Renders the cache in group order.
    pub fn draw_tree(&self, host: &impl HostTree) -> String {
        let snapshot = self.cache.snapshot();
        let groups = self
            .order
            .ids()
            .iter()
            .filter_map(|id| snapshot.get(id).map(|entry| (id, entry)))
            .map(|(id, entry)| {
                let selected =
                    entry.group.as_ref().and_then(|g| host.group(g)).and_then(|g| g.selected());
                let leaves = entry
                    .leaves
                    .iter()
                    .map(|leaf| {
                        let mut desc = match host.leaf(leaf) {
                            Some(state) => format!("{leaf} {}", state.title()),
                            None => format!("{leaf} <gone>"),
                        };
                        if host.leaf(leaf).is_some_and(|s| s.pinned) {
                            desc.push_str(" [pinned]");
                        }
                        if selected == Some(leaf) {
                            desc.push_str(" *");
                        }
                        ascii_tree::Tree::Leaf(vec![desc])
                    })
                    .collect();
                ascii_tree::Tree::Node(format!("{id} ({:?})", entry.group_type), leaves)
            })
            .collect();
        let title = match self.strategy {
            Some(name) => format!("groups, sorted by {name}"),
            None => "groups".to_string(),
        };
        let mut out = String::new();
        _ = ascii_tree::write_tree(&mut out, &ascii_tree::Tree::Node(title, groups));
        out
    }
}
