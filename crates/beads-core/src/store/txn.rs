//! Write transactions with an in-memory undo log.
//!
//! A [`Txn`] borrows the store state mutably for the duration of one public
//! write. Every item it touches is snapshotted the first time it is reached
//! through [`Txn::edit`], [`Txn::insert`] or [`Txn::remove`]. On commit the
//! snapshot sink receives the whole item set; if the sink fails, or the
//! transaction is dropped without committing, every touched item is restored
//! from the log.
//!
//! # Derived state
//!
//! [`Txn::settle`] runs the follow-up work every write shares:
//!
//! 1. Recompute the derived status of each parent whose child set or child
//!    statuses were touched.
//! 2. Collect dependents freed by items that turned terminal.
//! 3. Strip edges that point at items that were just deleted.
//!
//! `updated_at` is advanced at commit time, and only on items whose content
//! actually changed.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use super::{BeadRef, StoreState};
use crate::error::{StoreError, StoreResult};
use crate::graph::{blocking::BlockingGraph, cycles, hierarchy};
use crate::model::{Item, Status};
use crate::persist::SnapshotSink;

pub(crate) struct Txn<'s> {
    state: &'s mut StoreState,
    undo: BTreeMap<String, Option<Item>>,
    now: DateTime<Utc>,
    op: &'static str,
    committed: bool,
}

impl<'s> Txn<'s> {
    pub(crate) fn begin(state: &'s mut StoreState, now: DateTime<Utc>, op: &'static str) -> Self {
        Self {
            state,
            undo: BTreeMap::new(),
            now,
            op,
            committed: false,
        }
    }

    pub(crate) const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub(crate) fn items(&self) -> &BTreeMap<String, Item> {
        &self.state.items
    }

    pub(crate) fn get(&self, id: &str) -> StoreResult<&Item> {
        self.state
            .items
            .get(id)
            .ok_or_else(|| StoreError::not_found(id))
    }

    pub(crate) fn is_epic(&self, id: &str) -> bool {
        hierarchy::is_epic(&self.state.items, id)
    }

    fn remember(&mut self, id: &str) {
        if !self.undo.contains_key(id) {
            let original = self.state.items.get(id).cloned();
            self.undo.insert(id.to_string(), original);
        }
    }

    /// Mutable access to an existing item, recorded in the undo log.
    pub(crate) fn edit(&mut self, id: &str) -> StoreResult<&mut Item> {
        if !self.state.items.contains_key(id) {
            return Err(StoreError::not_found(id));
        }
        self.remember(id);
        self.state
            .items
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(id))
    }

    pub(crate) fn insert(&mut self, item: Item) {
        self.remember(&item.id);
        self.state.items.insert(item.id.clone(), item);
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Item> {
        self.remember(id);
        self.state.items.remove(id)
    }

    /// Allocate an id that is not yet a key.
    pub(crate) fn next_id(&mut self) -> StoreResult<String> {
        let StoreState { items, ids } = &mut *self.state;
        ids.generate(|candidate| items.contains_key(candidate))
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Validate and append the edge `from` blocked by `to`.
    ///
    /// Checks run in a fixed order: existence, self-link, deleted target,
    /// duplicate, parent/child deadlock, cycle.
    pub(crate) fn add_edge(&mut self, from: &str, to: &str) -> StoreResult<()> {
        let source = self.get(from)?;
        let target = self.get(to)?;
        if from == to {
            return Err(StoreError::invalid(format!("{from} cannot block itself")));
        }
        if target.status == Status::Deleted {
            return Err(StoreError::invalid(format!("{to} is deleted")));
        }
        if source.blocked_by.iter().any(|b| b == to) {
            return Err(StoreError::invalid(format!(
                "{from} is already blocked by {to}"
            )));
        }
        if let Some((parent, child)) = self.family_on_path(from, to) {
            return Err(StoreError::conflict(format!(
                "linking {from} to {to} would make {parent} and its child {child} wait on each other"
            )));
        }
        if let Some(cycle) = cycles::detect_cycle_on_add(&self.state.items, from, to) {
            return Err(StoreError::cycle(cycle.to_string()));
        }
        self.edit(from)?.blocked_by.push(to.to_string());
        Ok(())
    }

    /// A parent/child pair that the edge `from → to` would chain together.
    ///
    /// Adding the edge lets everything that reaches `from` reach everything
    /// `to` reaches.
    fn family_on_path(&self, from: &str, to: &str) -> Option<(String, String)> {
        let items = &self.state.items;
        let upstream = cycles::reaching(items, from);
        let downstream = cycles::reachable(items, to);
        let pair = |a: &HashSet<&str>, b: &HashSet<&str>| {
            a.iter().find_map(|id| {
                let parent = items.get(*id)?.parent()?;
                b.contains(parent)
                    .then(|| (parent.to_string(), (*id).to_string()))
            })
        };
        pair(&upstream, &downstream).or_else(|| pair(&downstream, &upstream))
    }

    /// Conflict if `a` and `b` already sit on one blocking chain.
    pub(crate) fn ensure_unlinked(&self, a: &str, b: &str) -> StoreResult<()> {
        let items = &self.state.items;
        if cycles::reachable(items, a).contains(b) || cycles::reachable(items, b).contains(a) {
            return Err(StoreError::conflict(format!(
                "{a} and {b} are linked by a blocking chain"
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Settling
    // -----------------------------------------------------------------------

    /// Recompute parents, collect unblocked dependents, strip dead edges.
    pub(crate) fn settle(&mut self) -> Vec<BeadRef> {
        self.recompute_touched_parents();
        let unblocked = self.unblocked();
        self.strip_deleted_edges();
        unblocked
    }

    fn recompute_touched_parents(&mut self) {
        let mut parents: BTreeSet<String> = BTreeSet::new();
        for (id, original) in &self.undo {
            if let Some(original) = original {
                parents.extend(original.parent().map(str::to_string));
            }
            if let Some(current) = self.state.items.get(id) {
                parents.extend(current.parent().map(str::to_string));
            }
        }
        for parent in parents {
            self.recompute_parent(&parent);
        }
    }

    /// Write the derived status onto `parent_id`, if it still exists.
    ///
    /// Returns `true` when the stored status changed. Deleted parents keep
    /// their status.
    pub(crate) fn recompute_parent(&mut self, parent_id: &str) -> bool {
        let Some(parent) = self.state.items.get(parent_id) else {
            return false;
        };
        if parent.status == Status::Deleted {
            return false;
        }
        let statuses = hierarchy::children_of(&self.state.items, parent_id)
            .into_iter()
            .map(|child| child.status);
        let target = match hierarchy::derive_epic_status(statuses) {
            Some(derived) => derived,
            None if self.lost_last_child(parent_id) => Status::Open,
            None => return false,
        };
        if parent.status == target {
            return false;
        }
        tracing::debug!(op = self.op, epic = parent_id, from = %parent.status, to = %target, "epic status derived");
        self.remember(parent_id);
        if let Some(parent) = self.state.items.get_mut(parent_id) {
            parent.status = target;
        }
        true
    }

    fn lost_last_child(&self, parent_id: &str) -> bool {
        self.undo
            .values()
            .flatten()
            .any(|original| original.parent_id == parent_id)
    }

    /// Items that were active before this transaction and terminal now.
    fn newly_terminal(&self) -> Vec<String> {
        self.undo
            .iter()
            .filter(|(id, original)| {
                let was_active = original.as_ref().is_some_and(|o| o.status.is_active());
                let is_terminal = self
                    .state
                    .items
                    .get(*id)
                    .is_some_and(|now| now.status.is_terminal());
                was_active && is_terminal
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn unblocked(&self) -> Vec<BeadRef> {
        let graph = BlockingGraph::new(&self.state.items);
        let mut seen = BTreeSet::new();
        let mut freed = Vec::new();
        for id in self.newly_terminal() {
            for item in graph.newly_unblocked(&id) {
                if seen.insert(item.id.clone()) {
                    freed.push(BeadRef::from(item));
                }
            }
        }
        freed
    }

    fn strip_deleted_edges(&mut self) {
        let deleted: HashSet<String> = self
            .undo
            .keys()
            .filter(|id| {
                self.state
                    .items
                    .get(*id)
                    .is_some_and(|item| item.status == Status::Deleted)
            })
            .cloned()
            .collect();
        self.strip_edges_to(&deleted);
    }

    /// Remove every `blocked_by` entry naming one of `gone`.
    pub(crate) fn strip_edges_to(&mut self, gone: &HashSet<String>) {
        if gone.is_empty() {
            return;
        }
        let holders: Vec<String> = self
            .state
            .items
            .values()
            .filter(|item| item.blocked_by.iter().any(|b| gone.contains(b)))
            .map(|item| item.id.clone())
            .collect();
        for id in holders {
            self.remember(&id);
            if let Some(item) = self.state.items.get_mut(&id) {
                item.blocked_by.retain(|b| !gone.contains(b));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Commit / rollback
    // -----------------------------------------------------------------------

    fn changed_ids(&self) -> Vec<String> {
        self.undo
            .iter()
            .filter(|(id, original)| original.as_ref() != self.state.items.get(*id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Persist the whole state, or roll back on failure.
    ///
    /// A transaction that changed nothing skips the sink entirely.
    pub(crate) fn commit(mut self, sink: &dyn SnapshotSink) -> StoreResult<()> {
        let changed = self.changed_ids();
        if changed.is_empty() {
            self.committed = true;
            return Ok(());
        }
        for id in &changed {
            if let Some(item) = self.state.items.get_mut(id) {
                item.touch(self.now);
            }
        }
        let snapshot: Vec<&Item> = self.state.items.values().collect();
        match sink.save(&snapshot) {
            Ok(()) => {
                self.committed = true;
                tracing::debug!(op = self.op, changed = changed.len(), sink = %sink.describe(), "committed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(op = self.op, error = %err, "save failed; rolling back");
                Err(StoreError::Persist(err))
            }
        }
    }

    fn rollback(&mut self) {
        for (id, original) in std::mem::take(&mut self.undo) {
            match original {
                Some(item) => {
                    self.state.items.insert(id, item);
                }
                None => {
                    self.state.items.remove(&id);
                }
            }
        }
    }
}

impl Drop for Txn<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}
