//! Focus lock: keeps logical focus on a leaf of the root tree.

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::model::host::{FocusMode, GroupId, HostTree, LeafId, Region};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FocusState {
    #[default]
    Unlocked,
    Locked { leaf: LeafId, group: GroupId },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FocusOutcome {
    /// Lock disabled, nothing done.
    Passthrough,
    /// Focus drifted away and was put back on the locked leaf.
    Reasserted(LeafId),
    /// The active leaf moved to another group and the lock followed it.
    GroupChanged { from: Option<GroupId>, to: GroupId },
    /// Same group, new leaf.
    Tracked(LeafId),
}

#[derive(Debug, Default)]
pub struct FocusLock {
    enabled: bool,
    state: FocusState,
}

impl FocusLock {
    pub fn new(enabled: bool) -> Self { FocusLock { enabled, state: FocusState::Unlocked } }

    pub fn enabled(&self) -> bool { self.enabled }

    pub fn state(&self) -> &FocusState { &self.state }

    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.state = FocusState::Unlocked;
        }
        self.enabled = enabled;
    }

    pub fn on_active_leaf_changed(
        &mut self,
        host: &mut impl HostTree,
        active: Option<LeafId>,
    ) -> FocusOutcome {
        if !self.enabled {
            return FocusOutcome::Passthrough;
        }
        let tracked = active.filter(|leaf| {
            host.leaf(leaf).is_some() && host.region_of(leaf) == Some(Region::Root)
        });
        let Some(leaf) = tracked else {
            return self.reassert(host);
        };
        let Some(group) = host.parent_of(&leaf) else {
            return self.reassert(host);
        };

        match &self.state {
            FocusState::Locked { group: current, .. } if *current == group => {
                trace!(?leaf, "focus lock tracks leaf");
                self.state = FocusState::Locked { leaf: leaf.clone(), group };
                FocusOutcome::Tracked(leaf)
            }
            previous => {
                let from = match previous {
                    FocusState::Locked { group, .. } => Some(group.clone()),
                    FocusState::Unlocked => None,
                };
                debug!(?from, to = ?group, ?leaf, "focus lock group changed");
                lock_onto(host, &group);
                self.state = FocusState::Locked { leaf, group: group.clone() };
                FocusOutcome::GroupChanged { from, to: group }
            }
        }
    }

    fn reassert(&mut self, host: &mut impl HostTree) -> FocusOutcome {
        let FocusState::Locked { leaf, .. } = &self.state else {
            return FocusOutcome::Passthrough;
        };
        if host.leaf(leaf).is_none() {
            warn!(?leaf, "locked leaf is gone, releasing focus lock");
            self.state = FocusState::Unlocked;
            return FocusOutcome::Passthrough;
        }
        let leaf = leaf.clone();
        debug!(?leaf, "reasserting focus");
        host.set_active_leaf(&leaf, FocusMode::Keyboard);
        FocusOutcome::Reasserted(leaf)
    }
}

/// Moves the active-group marker to `group` and, for a stacked group, cycles
/// it through an unstacked layout so the active leaf is brought into view.
fn lock_onto(host: &mut impl HostTree, group: &GroupId) {
    for id in host.group_ids() {
        if let Some(g) = host.group_mut(&id) {
            g.active_marker = false;
        }
    }
    let Some(g) = host.group_mut(group) else {
        return;
    };
    g.active_marker = true;
    if g.stacked {
        g.stacked = false;
        host.recompute_dimensions(group);
        if let Some(g) = host.group_mut(group) {
            g.stacked = true;
        }
        host.recompute_dimensions(group);
    }
}
