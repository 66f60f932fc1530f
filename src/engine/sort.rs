//! Tab sorting for root groups.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, trace};

use crate::model::host::{GroupKind, HostTree, LeafState};

/// Registry key of a built-in strategy. This is what gets persisted.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum SortStrategyName {
    TitleAToZ,
    TitleZToA,
    PinnedAtTop,
    PinnedAtBottom,
    RecentOnTop,
    RecentOnBottom,
}

impl SortStrategyName {
    pub fn all() -> impl Iterator<Item = SortStrategyName> { Self::iter() }

    pub fn strategy(self) -> SortStrategy {
        let (compare, reverse): (CompareFn, bool) = match self {
            SortStrategyName::TitleAToZ => (by_title, false),
            SortStrategyName::TitleZToA => (by_title, true),
            SortStrategyName::PinnedAtTop => (pinned_first, false),
            SortStrategyName::PinnedAtBottom => (pinned_last, false),
            SortStrategyName::RecentOnTop => (most_recent_first, false),
            SortStrategyName::RecentOnBottom => (most_recent_last, false),
        };
        SortStrategy { name: self, compare, reverse }
    }

    pub fn is_pin_based(self) -> bool {
        matches!(self, SortStrategyName::PinnedAtTop | SortStrategyName::PinnedAtBottom)
    }
}

pub type CompareFn = fn(&LeafState, &LeafState) -> Ordering;

#[derive(Copy, Clone, Debug)]
pub struct SortStrategy {
    pub name: SortStrategyName,
    pub compare: CompareFn,
    pub reverse: bool,
}

/// Case-folded comparison with the raw strings as tie-break, so "apple"
/// and "Apple" sit together but still order deterministically.
fn by_title(a: &LeafState, b: &LeafState) -> Ordering {
    let (ta, tb) = (a.title(), b.title());
    ta.to_lowercase().cmp(&tb.to_lowercase()).then_with(|| ta.cmp(&tb))
}

fn pinned_first(a: &LeafState, b: &LeafState) -> Ordering { b.pinned.cmp(&a.pinned) }

fn pinned_last(a: &LeafState, b: &LeafState) -> Ordering { a.pinned.cmp(&b.pinned) }

fn most_recent_first(a: &LeafState, b: &LeafState) -> Ordering {
    b.active_time.cmp(&a.active_time)
}

fn most_recent_last(a: &LeafState, b: &LeafState) -> Ordering {
    a.active_time.cmp(&b.active_time)
}

/// Reorders the children of every root group with `strategy`.
///
/// Sidebars are left alone. Each group keeps the same leaf selected even when
/// its index changes. Returns the number of groups whose order changed.
pub fn sort_root_groups(host: &mut impl HostTree, strategy: &SortStrategy) -> usize {
    let mut changed = 0;
    for group_id in host.group_ids() {
        let Some(group) = host.group(&group_id) else {
            continue;
        };
        if group.kind() != GroupKind::Root || group.children.len() < 2 {
            continue;
        }
        let selected = group.selected().cloned();
        let mut keyed: Vec<_> = group
            .children
            .iter()
            .map(|leaf| (leaf.clone(), host.leaf(leaf).cloned().unwrap_or_default()))
            .collect();
        keyed.sort_by(|(_, a), (_, b)| (strategy.compare)(a, b));
        if strategy.reverse {
            keyed.reverse();
        }
        let sorted: Vec<_> = keyed.into_iter().map(|(leaf, _)| leaf).collect();

        let Some(group) = host.group_mut(&group_id) else {
            continue;
        };
        if group.children == sorted {
            continue;
        }
        trace!(?group_id, before = ?group.children, after = ?sorted, "sorted group");
        group.children = sorted;
        if let Some(selected) = &selected {
            group.select(selected);
        }
        changed += 1;
    }
    if changed > 0 {
        debug!(strategy = %strategy.name, groups = changed, "applied sort strategy");
        host.notify_layout_changed();
    }
    changed
}
