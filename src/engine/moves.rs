//! Structural moves of leaves between groups.
//!
//! Every operation resolves its ids against the live tree first and quietly
//! does nothing when one of them has gone stale: the tree may have changed
//! between the gesture that asked for the move and this call.

use tracing::{debug, trace};

use crate::model::host::{GroupId, HostTree, LeafId, SplitDirection};

/// Removes `leaf` from its group. An emptied group is detached, otherwise
/// the group selects the tab before the removed one.
fn take_from_group(host: &mut impl HostTree, leaf: &LeafId) -> Option<GroupId> {
    let group_id = host.parent_of(leaf)?;
    let group = host.group_mut(&group_id)?;
    let index = group.index_of(leaf)?;
    group.children.remove(index);
    if group.children.is_empty() {
        trace!(?group_id, "group emptied by move");
        host.detach_group(&group_id);
        return Some(group_id);
    }
    group.current_tab = index.saturating_sub(1).min(group.children.len() - 1);
    Some(group_id)
}

fn finish_move(host: &mut impl HostTree, from: &GroupId, to: &GroupId) {
    if from != to {
        host.recompute_dimensions(from);
    }
    host.recompute_dimensions(to);
    host.notify_layout_changed();
}

/// Moves `source` into the group of `target`, at `target`'s current index.
pub fn move_leaf(host: &mut impl HostTree, source: &LeafId, target: &LeafId) -> bool {
    if source == target {
        return false;
    }
    if host.leaf(source).is_none() || host.leaf(target).is_none() {
        return false;
    }
    let Some(target_group) = host.parent_of(target) else {
        return false;
    };
    let Some(target_index) = host.group(&target_group).and_then(|g| g.index_of(target)) else {
        return false;
    };
    let Some(source_group) = host.parent_of(source) else {
        return false;
    };
    if host.group(&source_group).and_then(|g| g.index_of(source)).is_none() {
        return false;
    }

    let Some(from) = take_from_group(host, source) else {
        return false;
    };
    // The target group cannot have been emptied: it still holds `target`.
    let Some(group) = host.group_mut(&target_group) else {
        return false;
    };
    let index = target_index.min(group.children.len());
    group.children.insert(index, source.clone());
    group.current_tab = index;
    host.reparent(source, &target_group);
    debug!(?source, ?target, ?from, to = ?target_group, index, "moved leaf");
    finish_move(host, &from, &target_group);
    true
}

/// Moves `source` to the end of `target_group`.
pub fn move_leaf_to_end(host: &mut impl HostTree, source: &LeafId, target_group: &GroupId) -> bool {
    if host.leaf(source).is_none() || host.group(target_group).is_none() {
        return false;
    }
    let Some(source_group) = host.parent_of(source) else {
        return false;
    };
    let Some(group) = host.group(&source_group) else {
        return false;
    };
    if group.index_of(source).is_none() {
        return false;
    }
    // Removing the only child would detach the very group we append to.
    if &source_group == target_group && group.children.len() == 1 {
        return false;
    }

    let Some(from) = take_from_group(host, source) else {
        return false;
    };
    let Some(group) = host.group_mut(target_group) else {
        return false;
    };
    group.children.push(source.clone());
    group.current_tab = group.children.len() - 1;
    host.reparent(source, target_group);
    debug!(?source, ?from, to = ?target_group, "moved leaf to end");
    finish_move(host, &from, target_group);
    true
}

/// Splits `source` off into a new group next to its current one.
///
/// The host duplicates the leaf into the split and the original is closed.
/// Returns the new group, or `None` when the host could not produce one.
pub fn move_leaf_to_new_group(host: &mut impl HostTree, source: &LeafId) -> Option<GroupId> {
    let source_group = host.parent_of(source)?;
    let group = host.group(&source_group)?;
    let direction = if group.height > group.width {
        SplitDirection::Horizontal
    } else {
        SplitDirection::Vertical
    };
    let copy = host.duplicate_into_split(source, direction)?;
    let Some(new_group) = host.parent_of(&copy) else {
        host.detach_leaf(&copy);
        return None;
    };
    if let Some(group) = host.group_mut(&new_group) {
        group.select(&copy);
    }
    if let Some(state) = host.leaf_mut(source) {
        state.closing = true;
    }
    host.detach_leaf(source);
    debug!(?source, ?copy, ?new_group, ?direction, "moved leaf into new group");
    host.recompute_dimensions(&new_group);
    host.notify_layout_changed();
    Some(new_group)
}
