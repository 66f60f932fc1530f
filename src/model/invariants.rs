use super::host::{GroupId, HostTree, LeafId, Region};
use crate::common::collections::HashMap;

/// Lists every structural invariant the tree currently violates.
///
/// The engine never produces these states on its own, so any entry here is a
/// defect. Tests run this after every mutation.
pub fn collect_tree_invariant_violations(host: &impl HostTree) -> Vec<String> {
    let mut violations = Vec::new();
    let mut owner: HashMap<LeafId, GroupId> = HashMap::default();

    for group_id in host.group_ids() {
        let Some(group) = host.group(&group_id) else {
            violations.push(format!("group {group_id} is listed but cannot be resolved"));
            continue;
        };
        if group.children.is_empty() {
            violations.push(format!("group {group_id} is attached with zero children"));
        } else if group.current_tab >= group.children.len() {
            violations.push(format!(
                "group {group_id} selects index {} of {} children",
                group.current_tab,
                group.children.len()
            ));
        }
        for leaf in &group.children {
            if let Some(previous) = owner.insert(leaf.clone(), group_id.clone()) {
                violations
                    .push(format!("leaf {leaf} is a child of both {previous} and {group_id}"));
            }
            match host.parent_of(leaf) {
                Some(parent) if parent == group_id => {}
                Some(parent) => violations.push(format!(
                    "leaf {leaf} is listed under {group_id} but points at {parent}"
                )),
                None => violations.push(format!("leaf {leaf} under {group_id} has no parent")),
            }
            if host.leaf(leaf).is_none() {
                violations.push(format!("leaf {leaf} under {group_id} cannot be resolved"));
            }
        }
    }

    for region in Region::TRAVERSAL_ORDER {
        for leaf in host.leaves_in(region) {
            if !owner.contains_key(&leaf) {
                violations.push(format!("leaf {leaf} in {region:?} belongs to no listed group"));
            }
        }
    }

    violations
}
