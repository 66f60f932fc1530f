//! In-memory host tree.
//!
//! Backs the command line front end and the tests. Groups and leaves live in
//! id-keyed arenas; the per-region vectors hold the tree order.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::host::{
    FocusMode, GroupId, GroupState, HostTree, LeafId, LeafState, Region, SplitDirection,
    SubLocation,
};
use crate::common::collections::HashMap;

const DEFAULT_GROUP_WIDTH: f64 = 1200.0;
const DEFAULT_GROUP_HEIGHT: f64 = 800.0;

struct LeafNode {
    parent: Option<GroupId>,
    state: LeafState,
}

#[derive(Default)]
pub struct Workspace {
    regions: [Vec<GroupId>; 4],
    groups: HashMap<GroupId, GroupState>,
    leaves: HashMap<LeafId, LeafNode>,
    active: Option<LeafId>,
    next_id: u64,
    pub hover_preview_active: bool,
    /// Observable side effects, mostly for tests.
    pub layout_notifications: usize,
    pub dimension_recomputes: usize,
    pub focus_requests: Vec<(LeafId, FocusMode)>,
    pub opened_locations: Vec<(LeafId, SubLocation)>,
}

fn region_slot(region: Region) -> usize {
    match region {
        Region::LeftSidebar => 0,
        Region::RightSidebar => 1,
        Region::Root => 2,
        Region::Floating => 3,
    }
}

impl Workspace {
    pub fn new() -> Self { Self::default() }

    fn fresh_id(&mut self, prefix: &str) -> String {
        loop {
            self.next_id += 1;
            let id = format!("{prefix}{}", self.next_id);
            let taken = self.groups.contains_key(&GroupId::new(id.clone()))
                || self.leaves.contains_key(&LeafId::new(id.clone()));
            if !taken {
                return id;
            }
        }
    }

    pub fn add_group(&mut self, region: Region) -> GroupId {
        let id = GroupId::new(self.fresh_id("g"));
        self.insert_group(id.clone(), GroupState::new(region), None);
        id
    }

    fn insert_group(&mut self, id: GroupId, mut state: GroupState, after: Option<&GroupId>) {
        if state.width == 0.0 && state.height == 0.0 {
            state.width = DEFAULT_GROUP_WIDTH;
            state.height = DEFAULT_GROUP_HEIGHT;
        }
        let order = &mut self.regions[region_slot(state.region)];
        let at = after.and_then(|a| order.iter().position(|g| g == a)).map(|i| i + 1);
        match at {
            Some(idx) => order.insert(idx, id.clone()),
            None => order.push(id.clone()),
        }
        self.groups.insert(id, state);
    }

    pub fn add_leaf(&mut self, group: &GroupId, state: LeafState) -> LeafId {
        let id = LeafId::new(self.fresh_id("l"));
        self.attach_leaf(group, id.clone(), state);
        id
    }

    pub fn add_leaf_with_id(&mut self, group: &GroupId, id: &str, state: LeafState) -> LeafId {
        let id = LeafId::new(id);
        self.attach_leaf(group, id.clone(), state);
        id
    }

    fn attach_leaf(&mut self, group: &GroupId, id: LeafId, state: LeafState) {
        let parent = match self.groups.get_mut(group) {
            Some(g) => {
                g.children.push(id.clone());
                Some(group.clone())
            }
            None => None,
        };
        self.leaves.insert(id, LeafNode { parent, state });
    }

    pub fn set_active(&mut self, leaf: &LeafId) {
        if let Some(group) = self.parent_of(leaf)
            && let Some(g) = self.groups.get_mut(&group)
        {
            g.select(leaf);
        }
        self.active = Some(leaf.clone());
    }

    pub fn groups_in(&self, region: Region) -> &[GroupId] { &self.regions[region_slot(region)] }

    pub fn children(&self, group: &GroupId) -> Vec<LeafId> {
        self.groups.get(group).map(|g| g.children.clone()).unwrap_or_default()
    }

    pub fn contains_leaf(&self, leaf: &LeafId) -> bool { self.leaves.contains_key(leaf) }

    pub fn leaf_count(&self) -> usize { self.leaves.len() }

    /// Simulates the host clearing a leaf's parent mid-mutation.
    pub fn orphan_leaf(&mut self, leaf: &LeafId) {
        if let Some(node) = self.leaves.get_mut(leaf) {
            node.parent = None;
        }
    }

    fn unlink_from_parent(&mut self, leaf: &LeafId) -> Option<GroupId> {
        let parent = self.leaves.get_mut(leaf)?.parent.take()?;
        let group = self.groups.get_mut(&parent)?;
        if let Some(idx) = group.index_of(leaf) {
            group.children.remove(idx);
            if idx < group.current_tab || group.current_tab >= group.children.len() {
                group.current_tab = group.current_tab.saturating_sub(1);
            }
        }
        Some(parent)
    }

    pub fn to_snapshot(&self) -> WorkspaceSnapshot {
        let groups_for = |region: Region| {
            self.groups_in(region)
                .iter()
                .filter_map(|id| {
                    let g = self.groups.get(id)?;
                    Some(GroupSnapshot {
                        id: id.clone(),
                        current_tab: g.current_tab,
                        stacked: g.stacked,
                        width: g.width,
                        height: g.height,
                        leaves: g
                            .children
                            .iter()
                            .filter_map(|l| {
                                let node = self.leaves.get(l)?;
                                Some(LeafSnapshot { id: l.clone(), state: node.state.clone() })
                            })
                            .collect(),
                    })
                })
                .collect()
        };
        WorkspaceSnapshot {
            left_sidebar: groups_for(Region::LeftSidebar),
            right_sidebar: groups_for(Region::RightSidebar),
            root: groups_for(Region::Root),
            floating: groups_for(Region::Floating),
            active: self.active.clone(),
        }
    }

    pub fn from_snapshot(snapshot: WorkspaceSnapshot) -> Self {
        let mut ws = Workspace::new();
        let WorkspaceSnapshot {
            left_sidebar,
            right_sidebar,
            root,
            floating,
            active,
        } = snapshot;
        for (region, groups) in [
            (Region::LeftSidebar, left_sidebar),
            (Region::RightSidebar, right_sidebar),
            (Region::Root, root),
            (Region::Floating, floating),
        ] {
            for group in groups {
                let mut state = GroupState::new(region);
                state.stacked = group.stacked;
                state.width = group.width;
                state.height = group.height;
                ws.insert_group(group.id.clone(), state, None);
                for leaf in group.leaves {
                    ws.attach_leaf(&group.id, leaf.id, leaf.state);
                }
                if ws.groups.get(&group.id).is_some_and(|g| g.children.is_empty()) {
                    debug!(group = ?group.id, "skipping empty group in snapshot");
                    ws.detach_group(&group.id);
                } else if let Some(g) = ws.groups.get_mut(&group.id) {
                    g.current_tab = group.current_tab.min(g.children.len().saturating_sub(1));
                }
            }
        }
        if let Some(active) = active.filter(|a| ws.leaves.contains_key(a)) {
            ws.set_active(&active);
        }
        ws
    }
}

impl HostTree for Workspace {
    fn leaves_in(&self, region: Region) -> Vec<LeafId> {
        self.groups_in(region)
            .iter()
            .filter_map(|g| self.groups.get(g))
            .flat_map(|g| g.children.iter().cloned())
            .collect()
    }

    fn group_ids(&self) -> Vec<GroupId> { self.regions.iter().flatten().cloned().collect() }

    fn parent_of(&self, leaf: &LeafId) -> Option<GroupId> {
        self.leaves.get(leaf).and_then(|n| n.parent.clone())
    }

    fn leaf(&self, leaf: &LeafId) -> Option<&LeafState> { self.leaves.get(leaf).map(|n| &n.state) }

    fn leaf_mut(&mut self, leaf: &LeafId) -> Option<&mut LeafState> {
        self.leaves.get_mut(leaf).map(|n| &mut n.state)
    }

    fn group(&self, group: &GroupId) -> Option<&GroupState> { self.groups.get(group) }

    fn group_mut(&mut self, group: &GroupId) -> Option<&mut GroupState> {
        self.groups.get_mut(group)
    }

    fn reparent(&mut self, leaf: &LeafId, group: &GroupId) {
        if let Some(node) = self.leaves.get_mut(leaf) {
            node.parent = Some(group.clone());
        }
    }

    fn detach_leaf(&mut self, leaf: &LeafId) -> bool {
        if !self.leaves.contains_key(leaf) {
            return false;
        }
        let parent = self.unlink_from_parent(leaf);
        self.leaves.remove(leaf);
        trace!(?leaf, ?parent, "leaf detached");
        if let Some(parent) = &parent
            && self.groups.get(parent).is_some_and(|g| g.children.is_empty())
        {
            self.detach_group(parent);
        }
        if self.active.as_ref() == Some(leaf) {
            self.active = parent
                .as_ref()
                .and_then(|p| self.groups.get(p))
                .and_then(|g| g.selected().cloned());
        }
        true
    }

    fn detach_group(&mut self, group: &GroupId) -> bool {
        let Some(state) = self.groups.remove(group) else {
            return false;
        };
        self.regions[region_slot(state.region)].retain(|g| g != group);
        for leaf in &state.children {
            self.leaves.remove(leaf);
            if self.active.as_ref() == Some(leaf) {
                self.active = None;
            }
        }
        debug!(?group, "group detached");
        true
    }

    fn recompute_dimensions(&mut self, group: &GroupId) {
        if self.groups.contains_key(group) {
            self.dimension_recomputes += 1;
        }
    }

    fn notify_layout_changed(&mut self) { self.layout_notifications += 1; }

    fn duplicate_into_split(
        &mut self,
        leaf: &LeafId,
        direction: SplitDirection,
    ) -> Option<LeafId> {
        let source_group = self.parent_of(leaf)?;
        let mut state = self.leaves.get(leaf)?.state.clone();
        let source = self.groups.get_mut(&source_group)?;
        let mut split = GroupState::new(source.region);
        match direction {
            SplitDirection::Vertical => source.width /= 2.0,
            SplitDirection::Horizontal => source.height /= 2.0,
        }
        split.width = source.width;
        split.height = source.height;

        let group_id = GroupId::new(self.fresh_id("g"));
        self.insert_group(group_id.clone(), split, Some(&source_group));
        state.creation_time = None;
        state.closing = false;
        let new_leaf = LeafId::new(self.fresh_id("l"));
        self.attach_leaf(&group_id, new_leaf.clone(), state);
        debug!(?leaf, ?new_leaf, ?group_id, ?direction, "leaf duplicated into split");
        Some(new_leaf)
    }

    fn active_leaf(&self) -> Option<LeafId> { self.active.clone() }

    fn set_active_leaf(&mut self, leaf: &LeafId, focus: FocusMode) {
        if !self.leaves.contains_key(leaf) {
            return;
        }
        self.set_active(leaf);
        self.focus_requests.push((leaf.clone(), focus));
    }

    fn open_sub_location(&mut self, leaf: &LeafId, location: &SubLocation) {
        if self.leaves.contains_key(leaf) {
            self.opened_locations.push((leaf.clone(), location.clone()));
        }
    }

    fn materialize(&mut self, leaf: &LeafId) {
        if let Some(node) = self.leaves.get_mut(leaf) {
            node.state.deferred = false;
        }
    }

    fn hover_preview_owns_focus(&self) -> bool { self.hover_preview_active }
}

/// On-disk form of a [`Workspace`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    #[serde(default)]
    pub left_sidebar: Vec<GroupSnapshot>,
    #[serde(default)]
    pub right_sidebar: Vec<GroupSnapshot>,
    #[serde(default)]
    pub root: Vec<GroupSnapshot>,
    #[serde(default)]
    pub floating: Vec<GroupSnapshot>,
    #[serde(default)]
    pub active: Option<LeafId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub id: GroupId,
    #[serde(default)]
    pub current_tab: usize,
    #[serde(default)]
    pub stacked: bool,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub leaves: Vec<LeafSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeafSnapshot {
    pub id: LeafId,
    #[serde(flatten)]
    pub state: LeafState,
}
