//! Relationship queries over the in-memory item map.
//!
//! These helpers borrow the store's `BTreeMap<String, Item>` and never mutate
//! it; the store decides what to do with their answers.
//!
//! ## Submodules
//!
//! - [`blocking`]: active/resolved blockers, dependents, readiness, newly
//!   unblocked items.
//! - [`cycles`]: BFS reachability and cycle detection for new edges.
//! - [`hierarchy`]: epic/child index, progress and derived epic status.

pub mod blocking;
pub mod cycles;
pub mod hierarchy;
