//! Epic/child containment and derived epic status.
//!
//! Nesting is one level deep: an item with a non-empty `parent_id` is a
//! **child**, an item that some child points at is an **epic**. Neither role is
//! stored; both are read off the `parent_id` fields.
//!
//! # Derived status
//!
//! An epic's status is a pure function of its children's statuses (see
//! [`derive_epic_status`]). The store writes the derived value back whenever a
//! child-affecting mutation commits, so readers never derive on the fly.
//!
//! Deleted children still count towards an epic: an epic whose children are
//! all deleted derives to `closed`.

#![allow(
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{Item, Status};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Per-status counts of an epic's children.
///
/// `total` includes deleted children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: u32,
    pub open: u32,
    pub in_progress: u32,
    pub closed: u32,
    pub deleted: u32,
    pub not_ready: u32,
}

impl Progress {
    pub fn from_statuses(statuses: impl IntoIterator<Item = Status>) -> Self {
        let mut progress = Self::default();
        for status in statuses {
            progress.total += 1;
            match status {
                Status::Open => progress.open += 1,
                Status::InProgress => progress.in_progress += 1,
                Status::Closed => progress.closed += 1,
                Status::Deleted => progress.deleted += 1,
                Status::NotReady => progress.not_ready += 1,
            }
        }
        progress
    }

    /// Children in `closed` or `deleted`.
    pub const fn finished(&self) -> u32 {
        self.closed + self.deleted
    }

    pub const fn is_complete(&self) -> bool {
        self.total > 0 && self.finished() == self.total
    }

    /// Percentage of finished children, `0.0..=100.0`.
    ///
    /// Returns `0.0` for an empty set.
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_complete(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        self.finished() as f32 / self.total as f32 * 100.0
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Status an epic must carry given its children's statuses.
///
/// Returns `None` for an empty child set: the item is not an epic.
pub fn derive_epic_status(statuses: impl IntoIterator<Item = Status>) -> Option<Status> {
    let progress = Progress::from_statuses(statuses);
    if progress.total == 0 {
        return None;
    }
    let derived = if progress.is_complete() {
        Status::Closed
    } else if progress.in_progress > 0 {
        Status::InProgress
    } else if progress.open > 0 {
        Status::Open
    } else {
        Status::NotReady
    };
    Some(derived)
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// parent id → child ids, built once per read.
#[derive(Debug, Clone, Default)]
pub struct ChildIndex<'a> {
    children: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> ChildIndex<'a> {
    pub fn new(items: &'a BTreeMap<String, Item>) -> Self {
        let mut children: HashMap<&'a str, Vec<&'a str>> = HashMap::new();
        for (id, item) in items {
            if let Some(parent) = item.parent() {
                children.entry(parent).or_default().push(id.as_str());
            }
        }
        Self { children }
    }

    pub fn is_epic(&self, id: &str) -> bool {
        self.children.contains_key(id)
    }

    /// Child ids in key order, deleted children included.
    pub fn children(&self, id: &str) -> &[&'a str] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }
}

/// Children of `parent_id`, deleted ones included, in key order.
pub fn children_of<'a>(items: &'a BTreeMap<String, Item>, parent_id: &str) -> Vec<&'a Item> {
    items
        .values()
        .filter(|item| item.parent_id == parent_id && !parent_id.is_empty())
        .collect()
}

pub fn is_epic(items: &BTreeMap<String, Item>, id: &str) -> bool {
    !id.is_empty() && items.values().any(|item| item.parent_id == id)
}

/// Progress over a child set. `None` for an empty set: not an epic.
pub fn progress_of(children: &[&Item]) -> Option<Progress> {
    (!children.is_empty()).then(|| Progress::from_statuses(children.iter().map(|c| c.status)))
}

/// The item `item` is attached to, if it names one that exists.
///
/// A `parent_id` pointing at a missing item makes an orphan, which every
/// reader and writer treats as standalone.
pub fn attached_parent<'a>(items: &'a BTreeMap<String, Item>, item: &Item) -> Option<&'a Item> {
    item.parent().and_then(|p| items.get(p))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{item, map};
    use Status::{Closed, Deleted, InProgress, NotReady, Open};

    #[test]
    fn empty_child_set_is_not_an_epic() {
        assert_eq!(derive_epic_status([]), None);
    }

    #[test]
    fn derivation_table() {
        let cases: &[(&[Status], Status)] = &[
            (&[Closed, Closed], Closed),
            (&[Deleted, Deleted], Closed),
            (&[Closed, Deleted], Closed),
            (&[InProgress, Open, NotReady], InProgress),
            (&[Closed, InProgress], InProgress),
            (&[Open, NotReady], Open),
            (&[Open, Closed], Open),
            (&[NotReady, NotReady], NotReady),
            (&[NotReady, Closed, Deleted], NotReady),
        ];
        for (children, expected) in cases {
            assert_eq!(
                derive_epic_status(children.iter().copied()),
                Some(*expected),
                "children {children:?}"
            );
        }
    }

    #[test]
    fn progress_counts_every_status() {
        let progress = Progress::from_statuses([Open, Open, Closed, Deleted, NotReady, InProgress]);
        assert_eq!(progress.total, 6);
        assert_eq!(progress.open, 2);
        assert_eq!(progress.finished(), 2);
        assert!(!progress.is_complete());
        assert!((progress.percent_complete() - 100.0 / 3.0).abs() < 0.01);
        assert!((Progress::default().percent_complete()).abs() < f32::EPSILON);
    }

    #[test]
    fn child_index_matches_scans() {
        let items = map(vec![
            item("e", Open, &[], ""),
            item("c1", Open, &[], "e"),
            item("c2", Deleted, &[], "e"),
            item("s", Open, &[], ""),
        ]);
        let index = ChildIndex::new(&items);
        assert!(index.is_epic("e"));
        assert!(!index.is_epic("s"));
        assert_eq!(index.children("e"), &["c1", "c2"]);
        assert!(index.children("s").is_empty());
        assert!(is_epic(&items, "e"));
        assert!(!is_epic(&items, ""));
        assert_eq!(children_of(&items, "e").len(), 2);
        assert_eq!(progress_of(&children_of(&items, "e")).map(|p| p.deleted), Some(1));
        assert_eq!(progress_of(&children_of(&items, "s")), None);
    }

    #[test]
    fn orphans_have_no_attached_parent() {
        let items = map(vec![
            item("e", Open, &[], ""),
            item("c", Open, &[], "e"),
            item("o", Open, &[], "gone"),
        ]);
        assert_eq!(attached_parent(&items, &items["c"]).map(|p| p.id.as_str()), Some("e"));
        assert!(attached_parent(&items, &items["o"]).is_none());
        assert!(attached_parent(&items, &items["e"]).is_none());
    }
}
