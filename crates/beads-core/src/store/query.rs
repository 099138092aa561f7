//! Read operations: lookup, views, dependency reports, list and search.
//!
//! # List modes
//!
//! - **Flat** (`ready` or an `assignee` filter): leaf items only, each with its
//!   parent attached. This is an agent's work queue.
//! - **Hierarchical** (default): top-level items only; epics carry their
//!   non-deleted children inline. Filters decide at the top level and children
//!   ride along with their epic.
//!
//! Both modes sort by priority (critical first), then newest first, and
//! paginate after sorting.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{BeadRef, IssueStore, StoreState};
use crate::error::{StoreError, StoreResult};
use crate::graph::blocking::BlockingGraph;
use crate::graph::hierarchy::{ChildIndex, Progress, attached_parent, progress_of};
use crate::model::{IssueType, Item, Priority, Status};

pub const DEFAULT_PER_PAGE: usize = 50;
pub const MAX_PER_PAGE: usize = 500;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    /// Clamp to `page >= 1` and `1..=MAX_PER_PAGE`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    fn slice<T>(self, rows: Vec<T>) -> Page<T> {
        let Self { page, per_page } = self.normalized();
        let total = rows.len();
        let items = rows
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .collect();
        Page {
            items,
            total,
            page,
            per_page,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Rows before pagination.
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub id: String,
    pub title: String,
}

/// One row of a list or search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    #[serde(flatten)]
    pub item: Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    pub is_epic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Item>,
}

/// An item enriched with its epic or parent context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: Item,
    pub is_epic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BeadRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deps {
    pub active_blockers: Vec<BeadRef>,
    pub resolved_blockers: Vec<BeadRef>,
    pub blocks: Vec<BeadRef>,
}

/// List filters. Empty vectors and `None` match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub all: bool,
    pub ready: bool,
    pub statuses: Vec<Status>,
    pub priorities: Vec<Priority>,
    pub types: Vec<IssueType>,
    /// Every listed tag must be present.
    pub tags: Vec<String>,
    pub assignee: Option<String>,
    pub page: PageRequest,
}

impl ListFilter {
    /// Flat mode lists work units; hierarchical mode lists containers.
    #[must_use]
    pub const fn is_flat(&self) -> bool {
        self.ready || self.assignee.is_some()
    }

    /// Statuses to keep, or `None` for no status filtering.
    #[must_use]
    pub fn effective_statuses(&self) -> Option<Vec<Status>> {
        if self.ready {
            Some(vec![Status::Open])
        } else if self.all {
            None
        } else if self.statuses.is_empty() {
            Some(Status::DEFAULT_LISTED.to_vec())
        } else {
            Some(self.statuses.clone())
        }
    }

    fn matches(&self, item: &Item, statuses: Option<&[Status]>) -> bool {
        statuses.is_none_or(|s| s.contains(&item.status))
            && (self.priorities.is_empty() || self.priorities.contains(&item.priority))
            && (self.types.is_empty() || self.types.contains(&item.issue_type))
            && self.tags.iter().all(|tag| item.has_tag(tag))
            && self.assignee.as_ref().is_none_or(|a| &item.assignee == a)
    }
}

/// Priority rank ascending, then newest first, then id.
fn queue_order(a: &Item, b: &Item) -> Ordering {
    a.priority
        .rank()
        .cmp(&b.priority.rank())
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

impl IssueStore {
    /// Resolve a full id or a unique prefix to a full id.
    pub fn resolve(&self, input: &str) -> StoreResult<String> {
        let state = self.read();
        state.ids.resolve(input, state.items.keys().map(String::as_str))
    }

    /// Resolve and fetch in one read.
    pub fn resolve_item(&self, input: &str) -> StoreResult<Item> {
        let state = self.read();
        let id = state.ids.resolve(input, state.items.keys().map(String::as_str))?;
        lookup(&state, &id).cloned()
    }

    pub fn get(&self, id: &str) -> StoreResult<Item> {
        lookup(&self.read(), id).cloned()
    }

    pub fn is_epic(&self, id: &str) -> bool {
        crate::graph::hierarchy::is_epic(&self.read().items, id)
    }

    /// Children of `id`, deleted ones included.
    pub fn children_of(&self, id: &str) -> Vec<Item> {
        crate::graph::hierarchy::children_of(&self.read().items, id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn view(&self, id: &str) -> StoreResult<ItemView> {
        let state = self.read();
        let item = lookup(&state, id)?;
        let index = ChildIndex::new(&state.items);
        let children: Vec<&Item> = index
            .children(id)
            .iter()
            .filter_map(|child| state.items.get(*child))
            .collect();
        let progress = progress_of(&children);
        Ok(ItemView {
            item: item.clone(),
            is_epic: progress.is_some(),
            progress,
            children: children.into_iter().map(BeadRef::from).collect(),
            parent_title: attached_parent(&state.items, item).map(|p| p.title.clone()),
        })
    }

    pub fn deps(&self, id: &str) -> StoreResult<Deps> {
        let state = self.read();
        let item = lookup(&state, id)?;
        let graph = BlockingGraph::new(&state.items);
        let refs = |items: Vec<&Item>| -> Vec<BeadRef> { items.into_iter().map(BeadRef::from).collect() };
        Ok(Deps {
            active_blockers: refs(graph.active_blockers(item)),
            resolved_blockers: refs(graph.resolved_blockers(item)),
            blocks: refs(graph.dependents(id)),
        })
    }

    /// Case-insensitive substring search over title and description.
    pub fn search(&self, query: &str, page: PageRequest) -> StoreResult<Page<ListEntry>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Err(StoreError::invalid("search query must not be empty"));
        }
        let state = self.read();
        let index = ChildIndex::new(&state.items);
        let mut hits: Vec<&Item> = state
            .items
            .values()
            .filter(|item| item.status != Status::Deleted)
            .filter(|item| {
                item.title.to_lowercase().contains(&needle)
                    || item.description.to_lowercase().contains(&needle)
            })
            .collect();
        hits.sort_by(|a, b| queue_order(a, b));
        let rows = hits
            .into_iter()
            .map(|item| entry(&state, &index, item, false))
            .collect();
        Ok(page.slice(rows))
    }

    pub fn list(&self, filter: &ListFilter) -> Page<ListEntry> {
        let state = self.read();
        let index = ChildIndex::new(&state.items);
        let statuses = filter.effective_statuses();
        let statuses = statuses.as_deref();

        let mut rows: Vec<&Item> = if filter.is_flat() {
            let graph = BlockingGraph::new(&state.items);
            state
                .items
                .values()
                .filter(|item| !index.is_epic(&item.id))
                .filter(|item| filter.matches(item, statuses))
                .filter(|item| !filter.ready || graph.is_ready(item))
                .collect()
        } else {
            state
                .items
                .values()
                .filter(|item| is_top_level(&state, item))
                .filter(|item| filter.matches(item, statuses))
                .collect()
        };
        rows.sort_by(|a, b| queue_order(a, b));

        let nest = !filter.is_flat();
        let rows = rows
            .into_iter()
            .map(|item| entry(&state, &index, item, nest))
            .collect();
        filter.page.slice(rows)
    }
}

fn lookup<'s>(state: &'s StoreState, id: &str) -> StoreResult<&'s Item> {
    state
        .items
        .get(id)
        .ok_or_else(|| StoreError::not_found(id))
}

/// Standalone items, epics and orphans whose parent is gone.
fn is_top_level(state: &StoreState, item: &Item) -> bool {
    attached_parent(&state.items, item).is_none()
}

fn entry(state: &StoreState, index: &ChildIndex<'_>, item: &Item, nest: bool) -> ListEntry {
    let children: Vec<&Item> = index
        .children(&item.id)
        .iter()
        .filter_map(|child| state.items.get(*child))
        .collect();
    let progress = progress_of(&children);
    let mut nested: Vec<Item> = if nest {
        children
            .into_iter()
            .filter(|child| child.status != Status::Deleted)
            .cloned()
            .collect()
    } else {
        Vec::new()
    };
    nested.sort_by(queue_order);
    ListEntry {
        item: item.clone(),
        parent: attached_parent(&state.items, item).map(|p| ParentRef {
            id: p.id.clone(),
            title: p.title.clone(),
        }),
        is_epic: progress.is_some(),
        progress,
        children: nested,
    }
}
