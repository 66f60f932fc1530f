pub mod host;
pub mod invariants;
pub mod store;
pub mod workspace;

pub use host::{
    ContentKey, FocusMode, GroupId, GroupKind, GroupState, HostTree, LeafContent, LeafId,
    LeafState, Region, SplitDirection, SubLocation,
};
pub use store::{FileStore, KeyValueStore, MemoryStore, PersistedState};
pub use workspace::Workspace;
