use serde_json::json;

use crate::common::config::Settings;
use crate::engine::{FocusOutcome, SortStrategyName, TabEngine};
use crate::error::StoreError;
use crate::model::host::{
    ContentKey, GroupId, HostTree, LeafId, LeafState, Region, SubLocation,
};
use crate::model::invariants::collect_tree_invariant_violations;
use crate::model::store::{KeyValueStore, MemoryStore};
use crate::model::workspace::{GroupSnapshot, LeafSnapshot, Workspace, WorkspaceSnapshot};

const ORDER_KEY: &str = "vertical-tabs/v1/group-order";
const SORT_KEY: &str = "vertical-tabs/v1/sort-strategy";

fn assert_healthy(ws: &Workspace) {
    let violations = collect_tree_invariant_violations(ws);
    assert!(violations.is_empty(), "{violations:#?}");
}

fn gids(names: &[&str]) -> Vec<GroupId> { names.iter().map(|n| GroupId::new(*n)).collect() }

/// g1 [a, b], g2 [c], left sidebar [s]
fn workspace() -> (Workspace, Vec<GroupId>, Vec<LeafId>) {
    let mut ws = Workspace::new();
    let g1 = ws.add_group(Region::Root);
    let g2 = ws.add_group(Region::Root);
    let side = ws.add_group(Region::LeftSidebar);
    let a = ws.add_leaf(&g1, LeafState::file("notes/a.md"));
    let b = ws.add_leaf(&g1, LeafState::file("notes/b.md"));
    let c = ws.add_leaf(&g2, LeafState::file("notes/c.md"));
    let s = ws.add_leaf(&side, LeafState::default());
    (ws, vec![g1, g2, side], vec![a, b, c, s])
}

fn engine(store: MemoryStore) -> TabEngine<MemoryStore> { TabEngine::new(Settings::default(), store) }

mod reconciliation {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn first_pass_builds_cache_and_persists_order() {
        let (mut ws, groups, leaves) = workspace();
        let mut engine = engine(MemoryStore::new());

        let outcome = engine.reconcile_at(&mut ws, 1_000);
        assert_eq!(outcome.added.len(), 3);

        let cache = engine.cache();
        assert_eq!(cache.group_ids().cloned().collect::<Vec<_>>(), vec![
            GroupId::left_sidebar(),
            groups[0].clone(),
            groups[1].clone(),
        ]);
        assert_eq!(cache.get(&GroupId::left_sidebar()).unwrap().leaves, vec![leaves[3].clone()]);
        assert_eq!(ws.leaf(&leaves[0]).unwrap().creation_time, Some(1_000));

        let stored = engine.store().raw(ORDER_KEY).unwrap().clone();
        assert_eq!(stored, json!(["left-sidebar", groups[0].as_str(), groups[1].as_str()]));
        assert_eq!(engine.store().raw("group-order"), Some(&stored));
    }

    #[test]
    fn repeated_reconcile_is_identical() {
        let (mut ws, ..) = workspace();
        let mut engine = engine(MemoryStore::new());
        engine.reconcile_at(&mut ws, 5);
        let first = serde_json::to_string(&engine.snapshot()).unwrap();
        let outcome = engine.reconcile_at(&mut ws, 6);
        let second = serde_json::to_string(&engine.snapshot()).unwrap();
        assert!(outcome.is_unchanged());
        assert_eq!(first, second);
    }

    #[test]
    fn persisted_order_survives_and_merges() {
        let group = |name: &str| GroupSnapshot {
            id: GroupId::new(name),
            current_tab: 0,
            stacked: false,
            width: 0.0,
            height: 0.0,
            leaves: vec![LeafSnapshot {
                id: LeafId::new(format!("{name}-leaf")),
                state: LeafState::file(format!("{name}.md")),
            }],
        };
        let mut ws = Workspace::from_snapshot(WorkspaceSnapshot {
            root: vec![group("g2"), group("g3"), group("g4")],
            ..WorkspaceSnapshot::default()
        });
        let store = MemoryStore::new().with_value(ORDER_KEY, json!(["g1", "g2", "g3"]));
        let mut engine = engine(store);

        engine.reconcile_at(&mut ws, 1);
        assert_eq!(engine.group_order().ids(), gids(&["g2", "g3", "g4"]).as_slice());
        assert_eq!(engine.store().raw(ORDER_KEY), Some(&json!(["g2", "g3", "g4"])));
    }

    #[test]
    fn legacy_keys_are_migrated_on_load() {
        let store = MemoryStore::new()
            .with_value("group-order", json!(["x", "y"]))
            .with_value("sort-strategy", json!("recentOnTop"));
        let engine = engine(store);

        assert_eq!(engine.group_order().ids(), gids(&["x", "y"]).as_slice());
        assert_eq!(engine.sort_strategy(), Some(SortStrategyName::RecentOnTop));
        assert_eq!(engine.store().raw(ORDER_KEY), Some(&json!(["x", "y"])));
        assert_eq!(engine.store().raw(SORT_KEY), Some(&json!("recentOnTop")));
    }

    #[test]
    fn legacy_order_loads_when_the_store_rejects_writes() {
        struct ReadOnly(MemoryStore);
        impl KeyValueStore for ReadOnly {
            fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
                self.0.get(key)
            }

            fn set(&mut self, _: &str, _: serde_json::Value) -> Result<(), StoreError> {
                Err(StoreError::Io {
                    op: "write",
                    path: "read-only".into(),
                    source: std::io::Error::other("read-only file system"),
                })
            }

            fn remove(&mut self, _: &str) -> Result<(), StoreError> { Ok(()) }
        }

        let store = ReadOnly(MemoryStore::new().with_value("group-order", json!(["g1", "g2"])));
        let engine = TabEngine::new(Settings::default(), store);
        assert_eq!(engine.group_order().ids(), gids(&["g1", "g2"]).as_slice());
    }

    #[test]
    fn unknown_persisted_strategy_is_ignored() {
        let store = MemoryStore::new().with_value(SORT_KEY, json!("byColour"));
        let settings =
            Settings { sort_strategy: Some("titleAToZ".into()), ..Settings::default() };
        let engine = TabEngine::new(settings, store);
        assert_eq!(engine.sort_strategy(), None);
    }

    #[test]
    fn configured_strategy_applies_when_nothing_is_stored() {
        let settings =
            Settings { sort_strategy: Some("pinnedAtTop".into()), ..Settings::default() };
        let engine = TabEngine::new(settings, MemoryStore::new());
        assert_eq!(engine.sort_strategy(), Some(SortStrategyName::PinnedAtTop));
    }
}

mod group_order {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn swap_and_move_to_end_persist() {
        let (mut ws, groups, _) = workspace();
        let mut engine = engine(MemoryStore::new());
        engine.reconcile_at(&mut ws, 1);

        assert!(engine.swap_group(&groups[0], &groups[1]));
        assert_eq!(engine.group_order().ids()[1..], [groups[1].clone(), groups[0].clone()]);
        assert!(engine.move_group_to_end(&GroupId::left_sidebar()));
        assert_eq!(
            engine.store().raw(ORDER_KEY),
            Some(&json!([groups[1].as_str(), groups[0].as_str(), "left-sidebar"]))
        );

        assert!(!engine.swap_group(&groups[0], &GroupId::new("missing")));
        assert!(!engine.move_group_to_end(&GroupId::new("missing")));
    }

    #[test]
    fn user_order_is_kept_across_reconciles() {
        let (mut ws, groups, leaves) = workspace();
        let mut engine = engine(MemoryStore::new());
        engine.reconcile_at(&mut ws, 1);
        engine.move_group_to_end(&groups[0]);

        let g3 = ws.add_group(Region::Floating);
        ws.add_leaf(&g3, LeafState::file("float.md"));
        ws.detach_leaf(&leaves[2]);
        engine.reconcile_at(&mut ws, 2);

        assert_eq!(engine.group_order().ids(), &[GroupId::left_sidebar(), groups[0].clone(), g3]);
    }
}

mod sorting {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn setting_a_strategy_persists_and_sorts() {
        let (mut ws, groups, leaves) = workspace();
        let mut engine = engine(MemoryStore::new());
        engine.reconcile_at(&mut ws, 1);
        ws.set_active(&leaves[0]);

        let changed = engine.set_sort_strategy(&mut ws, Some(SortStrategyName::TitleZToA));
        assert_eq!(changed, 1);
        assert_eq!(ws.children(&groups[0]), vec![leaves[1].clone(), leaves[0].clone()]);
        assert_eq!(ws.group(&groups[0]).unwrap().selected(), Some(&leaves[0]));
        assert_eq!(engine.cache().get(&groups[0]).unwrap().leaves, ws.children(&groups[0]));
        assert_eq!(engine.store().raw(SORT_KEY), Some(&json!("titleZToA")));

        engine.set_sort_strategy(&mut ws, None);
        assert_eq!(engine.store().raw(SORT_KEY), Some(&json!(null)));
        assert_eq!(engine.sort(&mut ws), 0);
        assert_eq!(ws.children(&groups[0]), vec![leaves[1].clone(), leaves[0].clone()]);
    }

    #[test]
    fn toggling_a_pin_resorts_under_pin_strategies() {
        let (mut ws, groups, leaves) = workspace();
        let mut engine = engine(MemoryStore::new());
        engine.set_sort_strategy(&mut ws, Some(SortStrategyName::PinnedAtTop));

        assert_eq!(engine.toggle_pin(&mut ws, &leaves[1]), Some(true));
        assert_eq!(ws.children(&groups[0]), vec![leaves[1].clone(), leaves[0].clone()]);
        assert_eq!(engine.toggle_pin(&mut ws, &leaves[1]), Some(false));
        assert_eq!(engine.toggle_pin(&mut ws, &LeafId::new("gone")), None);
    }
}

mod moving {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn moves_refresh_the_cache() {
        let (mut ws, groups, leaves) = workspace();
        let mut engine = engine(MemoryStore::new());
        engine.reconcile_at(&mut ws, 1);

        assert!(engine.move_leaf_to_end(&mut ws, &leaves[2], &groups[0]));
        assert!(!engine.cache().contains(&groups[1]));
        assert_eq!(engine.cache().get(&groups[0]).unwrap().leaves.len(), 3);
        assert!(!engine.group_order().ids().contains(&groups[1]));

        let split = engine.move_leaf_to_new_group(&mut ws, &leaves[0]).unwrap();
        assert!(engine.cache().contains(&split));
        assert_eq!(engine.group_order().ids().last(), Some(&split));
        assert_healthy(&ws);
    }

    #[test]
    fn stale_moves_do_not_touch_the_cache() {
        let (mut ws, _, leaves) = workspace();
        let mut engine = engine(MemoryStore::new());
        engine.reconcile_at(&mut ws, 1);
        let before = engine.snapshot();

        assert!(!engine.move_leaf(&mut ws, &leaves[0], &LeafId::new("gone")));
        assert_eq!(engine.move_leaf_to_new_group(&mut ws, &LeafId::new("gone")), None);
        assert_eq!(engine.snapshot(), before);
    }
}

mod dedup {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    fn key() -> ContentKey { ContentKey::new("file:F.md") }

    #[test]
    fn scenario_keeps_least_recent_unpinned() {
        let mut ws = Workspace::new();
        let g = ws.add_group(Region::Root);
        let a = ws.add_leaf(&g, LeafState::file("F.md").active_at(10).created_at(1));
        let b = ws.add_leaf(&g, LeafState::file("F.md").active_at(30).created_at(1));
        let c = ws.add_leaf(&g, LeafState::file("F.md").active_at(5).created_at(1).pinned(true));
        let mut engine = engine(MemoryStore::new());
        engine.reconcile_at(&mut ws, 1);

        let kept = engine.deduplicate(&mut ws, &key(), &[a.clone(), b.clone(), c.clone()], true);
        assert_eq!(kept, Some(a.clone()));
        assert!(!ws.contains_leaf(&b));
        assert!(ws.contains_leaf(&c));
        assert_eq!(engine.cache().get(&g).unwrap().leaves, vec![a, c]);
        assert_healthy(&ws);
    }

    #[test]
    fn opening_a_file_collapses_duplicates_only_when_enabled() {
        let (mut ws, groups, leaves) = workspace();
        let dup = ws.add_leaf(&groups[1], LeafState::file("notes/a.md").created_at(50));
        let mut engine = engine(MemoryStore::new());
        engine.reconcile_at(&mut ws, 10);

        assert_eq!(engine.on_file_opened(&mut ws, &dup), None);
        assert!(ws.contains_leaf(&dup));

        let settings = Settings { deduplicate_tabs: true, ..Settings::default() };
        let mut engine = TabEngine::new(settings, MemoryStore::new());
        engine.reconcile_at(&mut ws, 10);
        let jump = SubLocation::Line(12);
        engine.register_pending_jump(ContentKey::new("file:notes/a.md"), jump.clone());

        assert_eq!(engine.on_file_opened(&mut ws, &dup), Some(leaves[0].clone()));
        assert!(!ws.contains_leaf(&dup));
        assert_eq!(ws.parent_of(&leaves[0]), Some(groups[1].clone()));
        assert_eq!(ws.opened_locations, vec![(leaves[0].clone(), jump)]);
        assert_eq!(ws.active_leaf(), Some(leaves[0].clone()));
        assert_healthy(&ws);
    }

    #[test]
    fn existing_tabs_follow_same_group_setting() {
        let mut ws = Workspace::new();
        let g1 = ws.add_group(Region::Root);
        let g2 = ws.add_group(Region::Root);
        ws.add_leaf(&g1, LeafState::file("x.md").active_at(1));
        ws.add_leaf(&g2, LeafState::file("x.md").active_at(2));
        ws.add_leaf(&g2, LeafState::file("x.md").active_at(3));

        let settings = Settings { dedup_same_group_only: true, ..Settings::default() };
        let mut engine = TabEngine::new(settings, MemoryStore::new());
        engine.reconcile_at(&mut ws, 0);
        let outcomes = engine.deduplicate_existing_tabs(&mut ws);

        assert_eq!(outcomes.iter().map(|o| o.closed.len()).sum::<usize>(), 1);
        assert_eq!(ws.leaf_count(), 2);
        assert_eq!(engine.cache().len(), 2);
        assert_healthy(&ws);
    }
}

mod closing {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn close_others_and_close_group_spare_pinned() {
        let mut ws = Workspace::new();
        let g = ws.add_group(Region::Root);
        let a = ws.add_leaf(&g, LeafState::file("a.md"));
        let b = ws.add_leaf(&g, LeafState::file("b.md").pinned(true));
        let c = ws.add_leaf(&g, LeafState::file("c.md"));
        let d = ws.add_leaf(&g, LeafState::file("d.md"));
        let mut engine = engine(MemoryStore::new());
        engine.reconcile_at(&mut ws, 1);

        assert_eq!(engine.close_others(&mut ws, &c), vec![a, d]);
        assert_eq!(ws.children(&g), vec![b.clone(), c.clone()]);

        assert_eq!(engine.close_group(&mut ws, &g), vec![c]);
        assert_eq!(ws.children(&g), vec![b.clone()]);

        engine.toggle_pin(&mut ws, &b);
        assert_eq!(engine.close_group(&mut ws, &g), vec![b]);
        assert!(ws.group(&g).is_none());
        assert!(engine.cache().is_empty());
        assert_healthy(&ws);
    }

    #[test]
    fn promoting_an_ephemeral_leaf() {
        let (mut ws, groups, _) = workspace();
        let preview = ws.add_leaf(&groups[0], LeafState::file("p.md").ephemeral(true));
        let mut engine = engine(MemoryStore::new());
        assert!(engine.make_leaf_non_ephemeral(&mut ws, &preview));
        assert!(!ws.leaf(&preview).unwrap().ephemeral);
        assert!(!engine.make_leaf_non_ephemeral(&mut ws, &LeafId::new("gone")));
    }
}

mod focus {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn focus_lock_follows_configuration() {
        let (mut ws, groups, leaves) = workspace();
        let mut engine = engine(MemoryStore::new());
        assert_eq!(
            engine.on_active_leaf_changed(&mut ws, Some(leaves[3].clone())),
            FocusOutcome::Passthrough
        );

        engine.set_focus_lock(true);
        assert_eq!(
            engine.on_active_leaf_changed(&mut ws, Some(leaves[0].clone())),
            FocusOutcome::GroupChanged { from: None, to: groups[0].clone() }
        );
        assert_eq!(
            engine.on_active_leaf_changed(&mut ws, Some(leaves[3].clone())),
            FocusOutcome::Reasserted(leaves[0].clone())
        );
        assert_eq!(ws.active_leaf(), Some(leaves[0].clone()));
        assert!(engine.settings().focus_lock);
    }
}

mod presentation {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn draw_tree_follows_group_order() {
        let (mut ws, groups, leaves) = workspace();
        ws.leaf_mut(&leaves[1]).unwrap().pinned = true;
        ws.set_active(&leaves[1]);
        let mut engine = engine(MemoryStore::new());
        engine.reconcile_at(&mut ws, 1);
        engine.move_group_to_end(&GroupId::left_sidebar());

        let drawn = engine.draw_tree(&ws);
        let g1 = drawn.find(&format!("{} (Root)", groups[0])).unwrap();
        let side = drawn.find("left-sidebar (LeftSidebar)").unwrap();
        assert!(g1 < side, "{drawn}");
        assert!(drawn.contains(&format!("{} b [pinned] *", leaves[1])), "{drawn}");
        assert!(drawn.contains(&format!("{} a", leaves[0])), "{drawn}");
    }

    #[test]
    fn snapshot_serializes_for_the_presentation_layer() {
        let (mut ws, ..) = workspace();
        let mut engine = engine(MemoryStore::new());
        engine.reconcile_at(&mut ws, 1);
        let value = serde_json::to_value(engine.snapshot()).unwrap();
        assert_eq!(value["sort_strategy"], json!(null));
        assert_eq!(value["focus"], json!({"state": "unlocked"}));
        assert_eq!(value["group_order"][0], json!("left-sidebar"));
    }

    #[test]
    fn persistence_failures_do_not_stop_the_engine() {
        struct BrokenStore;
        impl KeyValueStore for BrokenStore {
            fn get(&self, _: &str) -> Result<Option<serde_json::Value>, crate::error::StoreError> {
                Err(crate::error::StoreError::Io {
                    op: "read",
                    path: "broken".into(),
                    source: std::io::Error::other("disk on fire"),
                })
            }

            fn set(&mut self, _: &str, _: serde_json::Value) -> Result<(), crate::error::StoreError> {
                Err(crate::error::StoreError::Io {
                    op: "write",
                    path: "broken".into(),
                    source: std::io::Error::other("disk on fire"),
                })
            }

            fn remove(&mut self, _: &str) -> Result<(), crate::error::StoreError> { Ok(()) }
        }

        let (mut ws, groups, _) = workspace();
        let mut engine = TabEngine::new(Settings::default(), BrokenStore);
        engine.reconcile_at(&mut ws, 1);
        assert_eq!(engine.group_order().ids().len(), 3);
        assert!(engine.swap_group(&groups[0], &groups[1]));
        engine.set_sort_strategy(&mut ws, Some(SortStrategyName::TitleAToZ));
        assert_eq!(engine.sort_strategy(), Some(SortStrategyName::TitleAToZ));
    }
}
