//! The host pane tree, seen from the engine.
//!
//! The host owns groups and leaves and mutates them whenever it likes. The
//! engine only ever holds identifiers and resolves them through [`HostTree`]
//! each time it needs a live node, so a stale id simply resolves to `None`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a leaf, assigned by the host.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeafId(String);

impl LeafId {
    pub fn new(id: impl Into<String>) -> Self { LeafId(id.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Debug for LeafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "LeafId({})", self.0) }
}

impl fmt::Display for LeafId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Identifier of a group.
///
/// The two sidebars are addressed by well-known ids; every other group carries
/// the id the host gave it.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub const LEFT_SIDEBAR: &'static str = "left-sidebar";
    pub const RIGHT_SIDEBAR: &'static str = "right-sidebar";

    pub fn new(id: impl Into<String>) -> Self { GroupId(id.into()) }

    pub fn left_sidebar() -> Self { GroupId(Self::LEFT_SIDEBAR.to_owned()) }

    pub fn right_sidebar() -> Self { GroupId(Self::RIGHT_SIDEBAR.to_owned()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "GroupId({})", self.0) }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Cache classification of a group. Floating groups count as root.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    LeftSidebar,
    RightSidebar,
    #[default]
    Root,
}

/// The four disjoint parts of the host tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    LeftSidebar,
    RightSidebar,
    Root,
    Floating,
}

impl Region {
    /// Order in which reconciliation walks the tree.
    pub const TRAVERSAL_ORDER: [Region; 4] =
        [Region::LeftSidebar, Region::RightSidebar, Region::Root, Region::Floating];

    pub fn group_kind(self) -> GroupKind {
        match self {
            Region::LeftSidebar => GroupKind::LeftSidebar,
            Region::RightSidebar => GroupKind::RightSidebar,
            Region::Root | Region::Floating => GroupKind::Root,
        }
    }

    /// Sidebars collapse into one cache entry each; other regions keep their
    /// own group ids.
    pub fn fixed_cache_id(self) -> Option<GroupId> {
        match self {
            Region::LeftSidebar => Some(GroupId::left_sidebar()),
            Region::RightSidebar => Some(GroupId::right_sidebar()),
            Region::Root | Region::Floating => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitDirection {
    /// Stacked one above the other.
    Horizontal,
    /// Side by side.
    Vertical,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FocusMode {
    Keyboard,
    /// Make the leaf active without moving keyboard focus into it.
    Passive,
}

/// Identity of the content a leaf shows. Two leaves with the same key are
/// duplicates of each other.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(String);

impl ContentKey {
    pub fn new(key: impl Into<String>) -> Self { ContentKey(key.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

/// What a leaf is showing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LeafContent {
    #[default]
    Empty,
    File {
        path: String,
    },
    Search {
        query: String,
    },
    Graph {
        /// Focused file of a local graph, `None` for the global graph.
        #[serde(default)]
        focus: Option<String>,
    },
    Web {
        url: String,
    },
}

impl LeafContent {
    pub fn file(path: impl Into<String>) -> Self { LeafContent::File { path: path.into() } }

    /// Key used to find duplicates. Views that are not tied to one piece of
    /// content (empty leaves, searches, the global graph) have none.
    pub fn content_key(&self) -> Option<ContentKey> {
        match self {
            LeafContent::Empty | LeafContent::Search { .. } => None,
            LeafContent::File { path } => Some(ContentKey(format!("file:{path}"))),
            LeafContent::Graph { focus: Some(path) } => Some(ContentKey(format!("graph:{path}"))),
            LeafContent::Graph { focus: None } => None,
            LeafContent::Web { url } => Some(ContentKey(format!("web:{url}"))),
        }
    }

    pub fn title(&self) -> String {
        match self {
            LeafContent::Empty => "New tab".to_owned(),
            LeafContent::File { path } => file_stem(path).to_owned(),
            LeafContent::Search { query } if query.is_empty() => "Search".to_owned(),
            LeafContent::Search { query } => format!("Search: {query}"),
            LeafContent::Graph { focus: None } => "Graph view".to_owned(),
            LeafContent::Graph { focus: Some(path) } => format!("Graph of {}", file_stem(path)),
            LeafContent::Web { url } => url.clone(),
        }
    }
}

fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Back/forward navigation stacks. Entries are opaque view states.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub back: Vec<serde_json::Value>,
    #[serde(default)]
    pub forward: Vec<serde_json::Value>,
}

/// Scroll/zoom state that is reapplied when a leaf takes another's place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EphemeralState {
    #[serde(default)]
    pub scroll: Option<f64>,
    #[serde(default)]
    pub zoom: Option<f64>,
}

/// Sub-location a pending "open at" request wants the leaf scrolled to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubLocation {
    Heading(String),
    Block(String),
    Line(u32),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafState {
    #[serde(default)]
    pub content: LeafContent,
    #[serde(default)]
    pub pinned: bool,
    /// Assigned by the engine the first time it sees the leaf.
    #[serde(default)]
    pub creation_time: Option<u64>,
    #[serde(default)]
    pub active_time: u64,
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default)]
    pub history: History,
    #[serde(default)]
    pub view: EphemeralState,
    /// The host has not materialized the view yet.
    #[serde(default)]
    pub deferred: bool,
    /// Set right before the view is torn down.
    #[serde(skip)]
    pub closing: bool,
}

impl LeafState {
    pub fn new(content: LeafContent) -> Self { LeafState { content, ..Default::default() } }

    pub fn file(path: impl Into<String>) -> Self { Self::new(LeafContent::file(path)) }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    pub fn active_at(mut self, time: u64) -> Self {
        self.active_time = time;
        self
    }

    pub fn created_at(mut self, time: u64) -> Self {
        self.creation_time = Some(time);
        self
    }

    /// The later of creation and last activation.
    pub fn last_touched(&self) -> u64 { self.creation_time.unwrap_or(0).max(self.active_time) }

    pub fn content_key(&self) -> Option<ContentKey> { self.content.content_key() }

    pub fn title(&self) -> String { self.content.title() }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupState {
    pub region: Region,
    pub children: Vec<LeafId>,
    #[serde(default)]
    pub current_tab: usize,
    #[serde(default)]
    pub stacked: bool,
    /// Visual "active group" marker driven by focus lock.
    #[serde(default)]
    pub active_marker: bool,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

impl GroupState {
    pub fn new(region: Region) -> Self {
        GroupState {
            region,
            children: Vec::new(),
            current_tab: 0,
            stacked: false,
            active_marker: false,
            width: 0.0,
            height: 0.0,
        }
    }

    pub fn kind(&self) -> GroupKind { self.region.group_kind() }

    pub fn selected(&self) -> Option<&LeafId> { self.children.get(self.current_tab) }

    pub fn index_of(&self, leaf: &LeafId) -> Option<usize> {
        self.children.iter().position(|c| c == leaf)
    }

    /// Selects `leaf` if it is a child. Returns whether it was.
    pub fn select(&mut self, leaf: &LeafId) -> bool {
        match self.index_of(leaf) {
            Some(idx) => {
                self.current_tab = idx;
                true
            }
            None => false,
        }
    }
}

/// Everything the engine consumes from the host.
///
/// Mutations are synchronous. Implementations own the real tree and may
/// change it between any two calls; every lookup must therefore tolerate ids
/// that no longer exist.
pub trait HostTree {
    /// Leaves of one region, in tree order.
    fn leaves_in(&self, region: Region) -> Vec<LeafId>;

    /// Every live group, in tree order.
    fn group_ids(&self) -> Vec<GroupId>;

    fn parent_of(&self, leaf: &LeafId) -> Option<GroupId>;

    fn leaf(&self, leaf: &LeafId) -> Option<&LeafState>;

    fn leaf_mut(&mut self, leaf: &LeafId) -> Option<&mut LeafState>;

    fn group(&self, group: &GroupId) -> Option<&GroupState>;

    fn group_mut(&mut self, group: &GroupId) -> Option<&mut GroupState>;

    /// Points the leaf's back-reference at `group` after the engine placed
    /// it in that group's children.
    fn reparent(&mut self, leaf: &LeafId, group: &GroupId);

    /// Closes a leaf. A group left without children is detached as well.
    fn detach_leaf(&mut self, leaf: &LeafId) -> bool;

    /// Removes a group (and anything still in it) from the tree.
    fn detach_group(&mut self, group: &GroupId) -> bool;

    fn recompute_dimensions(&mut self, group: &GroupId);

    fn notify_layout_changed(&mut self);

    /// Opens a copy of `leaf` in a brand-new group split off the leaf's group.
    fn duplicate_into_split(&mut self, leaf: &LeafId, direction: SplitDirection)
    -> Option<LeafId>;

    fn active_leaf(&self) -> Option<LeafId>;

    fn set_active_leaf(&mut self, leaf: &LeafId, focus: FocusMode);

    fn open_sub_location(&mut self, leaf: &LeafId, location: &SubLocation);

    /// Resolves a deferred leaf so its real content can be inspected.
    fn materialize(&mut self, _leaf: &LeafId) {}

    /// Whether a hover-preview popover currently owns focus.
    fn hover_preview_owns_focus(&self) -> bool { false }

    fn region_of_group(&self, group: &GroupId) -> Option<Region> {
        self.group(group).map(|g| g.region)
    }

    fn region_of(&self, leaf: &LeafId) -> Option<Region> {
        self.parent_of(leaf).and_then(|g| self.region_of_group(&g))
    }
}
