//! The per-tenant issue store.
//!
//! # Overview
//!
//! [`IssueStore`] owns the authoritative item map of one tenant behind a
//! single readers-writer lock. Reads share the lock for their full duration.
//! Writes hold it exclusively from validation through the snapshot save, so
//! each public write is a linearization point.
//!
//! Every write follows the same shape: open a [`txn::Txn`], validate and
//! mutate, [`settle`](txn::Txn::settle) derived state, commit. A failed save
//! restores the in-memory state before the lock is released.
//!
//! # Modules
//!
//! - `txn`: undo log, derived-state settling, commit/rollback.
//! - `ops`: the write operations.
//! - `query`: reads, the list engine and search.
//! - `clean`: unit-aware garbage collection.

mod clean;
mod ops;
mod query;
mod txn;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use query::{Deps, ItemView, ListEntry, ListFilter, Page, PageRequest, ParentRef};

use crate::clock::{Clock, SystemClock};
use crate::error::StoreResult;
use crate::id::{DEFAULT_PREFIX, IdGenerator};
use crate::model::{Item, Priority, Status};
use crate::persist::{FileSnapshot, SnapshotSink};

/// Knobs shared by every store a process opens.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub id_prefix: String,
    /// How long to wait for another process to release the data file.
    pub lock_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            id_prefix: DEFAULT_PREFIX.to_string(),
            lock_timeout: Duration::from_millis(500),
        }
    }
}

/// Short reference to an item, used in dependency and unblock reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeadRef {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub priority: Priority,
}

impl From<&Item> for BeadRef {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            status: item.status,
            priority: item.priority,
        }
    }
}

/// Result of a write that can free dependents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mutation {
    pub item: Item,
    /// Items left with no active blocker by this write.
    pub unblocked: Vec<BeadRef>,
}

pub(crate) struct StoreState {
    pub(crate) items: BTreeMap<String, Item>,
    pub(crate) ids: IdGenerator,
}

pub struct IssueStore {
    state: RwLock<StoreState>,
    sink: Arc<dyn SnapshotSink>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for IssueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssueStore")
            .field("sink", &self.sink.describe())
            .field("items", &self.len())
            .finish_non_exhaustive()
    }
}

impl IssueStore {
    /// Open the snapshot at `path`, taking its cross-process writer lock.
    pub fn open(path: &Path, options: &StoreOptions) -> StoreResult<Self> {
        let (sink, items) = FileSnapshot::open(path, options.lock_timeout)?;
        Ok(Self::from_parts(items, Arc::new(sink), &options.id_prefix))
    }

    /// Build a store over already-loaded items and an arbitrary sink.
    pub fn from_parts(items: Vec<Item>, sink: Arc<dyn SnapshotSink>, id_prefix: &str) -> Self {
        let items = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
        Self {
            state: RwLock::new(StoreState {
                items,
                ids: IdGenerator::new(id_prefix),
            }),
            sink,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub(crate) fn sink(&self) -> &dyn SnapshotSink {
        self.sink.as_ref()
    }

    /// Number of stored items, deleted ones included.
    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every stored item in id order.
    pub fn snapshot(&self) -> Vec<Item> {
        self.read().items.values().cloned().collect()
    }
}
