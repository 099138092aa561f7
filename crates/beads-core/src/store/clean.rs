//! Unit-aware garbage collection.
//!
//! Hard removal works on **units**: an epic together with all of its children,
//! or a standalone item. A unit goes only when it is finished and its newest
//! `updated_at` is strictly before the cutoff:
//!
//! - standalone (or orphaned) item: status `closed` or `deleted`;
//! - epic unit: every child `closed` or `deleted`, judged on the maximum
//!   `updated_at` across the epic and its children.
//!
//! Children of an epic are never removed on their own.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};

use super::IssueStore;
use super::txn::Txn;
use crate::error::StoreResult;
use crate::graph::hierarchy::{ChildIndex, attached_parent};
use crate::model::Item;

/// Ids of every item a clean at `cutoff` would remove, in key order.
pub(crate) fn doomed(items: &BTreeMap<String, Item>, cutoff: DateTime<Utc>) -> Vec<String> {
    let index = ChildIndex::new(items);
    let mut out = Vec::new();
    for (id, item) in items {
        if attached_parent(items, item).is_some() {
            continue;
        }
        let children: Vec<&Item> = index
            .children(id)
            .iter()
            .filter_map(|child| items.get(*child))
            .collect();
        if children.is_empty() {
            if item.status.is_terminal() && item.updated_at < cutoff {
                out.push(id.clone());
            }
            continue;
        }
        let finished = children.iter().all(|c| c.status.is_terminal());
        let newest = children
            .iter()
            .map(|c| c.updated_at)
            .fold(item.updated_at, std::cmp::max);
        if finished && newest < cutoff {
            out.push(id.clone());
            out.extend(children.iter().map(|c| c.id.clone()));
        }
    }
    out.sort();
    out
}

impl IssueStore {
    /// Hard-remove finished units older than `cutoff`. Returns the count.
    pub fn clean(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut state = self.write();
        let mut txn = Txn::begin(&mut state, self.now(), "clean");
        let doomed = doomed(txn.items(), cutoff);
        for id in &doomed {
            txn.remove(id);
        }
        let gone: HashSet<String> = doomed.iter().cloned().collect();
        txn.strip_edges_to(&gone);
        txn.commit(self.sink())?;
        if !doomed.is_empty() {
            tracing::info!(removed = doomed.len(), %cutoff, "cleaned");
        }
        Ok(doomed.len())
    }

    /// Clean with a cutoff of `age` before the store clock's now.
    pub fn clean_older_than(&self, age: TimeDelta) -> StoreResult<usize> {
        let cutoff = self
            .now()
            .checked_sub_signed(age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.clean(cutoff)
    }
}
