//! Blocking dependency graph over the store's item map.
//!
//! An edge `A → B` means "A is blocked by B" and lives in `A.blocked_by`.
//! A blocker is **active** while its status is `open`, `in_progress` or
//! `not_ready`; `closed` and `deleted` blockers are **resolved**.
//!
//! # Inherited blockers
//!
//! Blockers on an epic apply to every child: a child is ready only if neither
//! it nor its parent has an active blocker.
//!
//! [`BlockingGraph`] borrows the item map and precomputes the reverse
//! (`blocks`) index once, so dependents lookups are O(1) per item.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::{BTreeMap, HashMap};

use crate::model::{Item, Status};

/// Read-only blocking view over an item map.
#[derive(Debug, Clone)]
pub struct BlockingGraph<'a> {
    items: &'a BTreeMap<String, Item>,
    /// blocker id → ids of items it blocks (in key order).
    blocks: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> BlockingGraph<'a> {
    pub fn new(items: &'a BTreeMap<String, Item>) -> Self {
        let mut blocks: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
        for (id, item) in items {
            for blocker in &item.blocked_by {
                blocks.entry(blocker.as_str()).or_default().push(id.as_str());
            }
        }
        Self { items, blocks }
    }

    fn lookup(&self, id: &str) -> Option<&'a Item> {
        self.items.get(id)
    }

    /// Blockers of `item` that still hold it up, in `blocked_by` order.
    pub fn active_blockers(&self, item: &Item) -> Vec<&'a Item> {
        item.blocked_by
            .iter()
            .filter_map(|id| self.lookup(id))
            .filter(|b| b.status.is_active())
            .collect()
    }

    /// Blockers of `item` that are closed or deleted, in `blocked_by` order.
    pub fn resolved_blockers(&self, item: &Item) -> Vec<&'a Item> {
        item.blocked_by
            .iter()
            .filter_map(|id| self.lookup(id))
            .filter(|b| b.status.is_terminal())
            .collect()
    }

    pub fn has_active_blocker(&self, item: &Item) -> bool {
        item.blocked_by
            .iter()
            .filter_map(|id| self.lookup(id))
            .any(|b| b.status.is_active())
    }

    /// Own blockers plus blockers inherited from the parent epic.
    pub fn is_blocked(&self, item: &Item) -> bool {
        if self.has_active_blocker(item) {
            return true;
        }
        item.parent()
            .and_then(|parent_id| self.lookup(parent_id))
            .is_some_and(|parent| self.has_active_blocker(parent))
    }

    /// `open` and not blocked, directly or through the parent.
    pub fn is_ready(&self, item: &Item) -> bool {
        item.status == Status::Open && !self.is_blocked(item)
    }

    /// Non-deleted items that list `id` in their `blocked_by`.
    pub fn dependents(&self, id: &str) -> Vec<&'a Item> {
        self.blocks
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|dep| self.lookup(dep))
            .filter(|dep| dep.status != Status::Deleted)
            .collect()
    }

    /// Dependents of `resolved_id` left with no active blocker.
    ///
    /// Meaningful right after `resolved_id` turned terminal.
    pub fn newly_unblocked(&self, resolved_id: &str) -> Vec<&'a Item> {
        self.dependents(resolved_id)
            .into_iter()
            .filter(|dep| !self.has_active_blocker(dep))
            .collect()
    }
}
