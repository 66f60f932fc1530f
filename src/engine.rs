pub mod cache;
pub mod dedup;
#[allow(clippy::module_inception)]
pub mod engine;
pub mod focus_lock;
pub mod group_order;
pub mod moves;
pub mod sort;

pub use cache::{CacheEntry, CacheSnapshot, ReconcileOutcome};
pub use dedup::{DedupOutcome, PendingJumps};
pub use engine::{EngineSnapshot, TabEngine, now_ms};
pub use focus_lock::{FocusOutcome, FocusState};
pub use group_order::{GroupOrder, merge_order};
pub use sort::{SortStrategy, SortStrategyName};

#[cfg(test)]
mod tests;
