//! Write operations.
//!
//! All ids are full ids; prefix resolution happens at the boundary through
//! [`IssueStore::resolve`].

use std::collections::BTreeMap;

use super::txn::Txn;
use super::{IssueStore, Mutation};
use crate::error::{StoreError, StoreResult};
use crate::graph::hierarchy::attached_parent;
use crate::model::{Comment, Item, ItemUpdate, NewItem, ParentChange, Status};

fn clean_title(raw: &str) -> StoreResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(StoreError::invalid("title must not be empty"));
    }
    Ok(title.to_string())
}

fn push_tags(tags: &mut Vec<String>, extra: impl IntoIterator<Item = String>) {
    for tag in extra {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
}

fn dedup_ids(ids: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

impl IssueStore {
    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    pub fn create(&self, new: NewItem) -> StoreResult<Item> {
        self.create_inner(new, None)
    }

    /// Create directly under `parent_id`, turning it into (or keeping it) an epic.
    pub fn create_with_parent(&self, new: NewItem, parent_id: &str) -> StoreResult<Item> {
        self.create_inner(new, Some(parent_id))
    }

    fn create_inner(&self, new: NewItem, parent_id: Option<&str>) -> StoreResult<Item> {
        let title = clean_title(&new.title)?;
        let status = match new.status {
            None | Some(Status::Open) => Status::Open,
            Some(Status::NotReady) => Status::NotReady,
            Some(other) => {
                return Err(StoreError::invalid(format!(
                    "new items start open or not_ready, not {other}"
                )));
            }
        };

        let mut state = self.write();
        let mut txn = Txn::begin(&mut state, self.now(), "create");
        if let Some(parent_id) = parent_id {
            check_attach_target(&txn, parent_id)?;
        }

        let id = txn.next_id()?;
        let mut tags = Vec::new();
        push_tags(&mut tags, new.tags);
        let now = txn.now();
        txn.insert(Item {
            id: id.clone(),
            title,
            description: new.description,
            status,
            priority: new.priority,
            issue_type: new.issue_type,
            tags,
            blocked_by: Vec::new(),
            assignee: new.assignee.trim().to_string(),
            parent_id: parent_id.unwrap_or_default().to_string(),
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
            extra: BTreeMap::new(),
        });
        for blocker in dedup_ids(new.blocked_by) {
            txn.add_edge(&id, &blocker)?;
        }
        txn.settle();

        let item = txn.get(&id)?.clone();
        txn.commit(self.sink())?;
        tracing::debug!(id = %item.id, parent = %item.parent_id, "created");
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    /// Apply a partial update. Parent relocation runs in the same transaction.
    pub fn update(&self, id: &str, change: ItemUpdate) -> StoreResult<Mutation> {
        let mut state = self.write();
        let mut txn = Txn::begin(&mut state, self.now(), "update");
        txn.get(id)?;

        if let Some(status) = change.status {
            if txn.is_epic(id) {
                return Err(StoreError::conflict(format!(
                    "{id} is an epic; its status follows its children"
                )));
            }
            txn.edit(id)?.status = status;
        }

        let title = change.title.as_deref().map(clean_title).transpose()?;
        {
            let item = txn.edit(id)?;
            if let Some(title) = title {
                item.title = title;
            }
            if let Some(description) = change.description {
                item.description = description;
            }
            if let Some(priority) = change.priority {
                item.priority = priority;
            }
            if let Some(issue_type) = change.issue_type {
                item.issue_type = issue_type;
            }
            if let Some(tags) = change.tags {
                item.tags.clear();
                push_tags(&mut item.tags, tags);
            }
            push_tags(&mut item.tags, change.add_tags);
            if !change.remove_tags.is_empty() {
                let remove: Vec<&str> = change.remove_tags.iter().map(|t| t.trim()).collect();
                item.tags.retain(|t| !remove.contains(&t.as_str()));
            }
            if let Some(assignee) = change.assignee {
                item.assignee = assignee.trim().to_string();
            }
        }

        if let Some(blocked_by) = change.blocked_by {
            txn.edit(id)?.blocked_by.clear();
            for blocker in dedup_ids(blocked_by) {
                txn.add_edge(id, &blocker)?;
            }
        }

        match change.parent {
            Some(ParentChange::Attach(target)) => move_into(&mut txn, id, &target)?,
            Some(ParentChange::Detach) => move_out(&mut txn, id)?,
            None => {}
        }
        if change.status.is_some_and(Status::is_active) {
            check_parent_alive(&txn, id)?;
        }

        let unblocked = txn.settle();
        let item = txn.get(id)?.clone();
        txn.commit(self.sink())?;
        Ok(Mutation { item, unblocked })
    }

    /// Reopen a terminal item.
    pub fn reopen(&self, id: &str) -> StoreResult<Mutation> {
        self.update(id, ItemUpdate::status(Status::Open))
    }

    /// Close an item.
    pub fn close(&self, id: &str) -> StoreResult<Mutation> {
        self.update(id, ItemUpdate::status(Status::Closed))
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    /// Soft delete. Deleting an already-deleted item changes nothing.
    pub fn delete(&self, id: &str) -> StoreResult<Mutation> {
        let mut state = self.write();
        let mut txn = Txn::begin(&mut state, self.now(), "delete");
        let item = txn.get(id)?;
        if item.status == Status::Deleted {
            return Ok(Mutation {
                item: item.clone(),
                unblocked: Vec::new(),
            });
        }
        let live_children: Vec<String> = crate::graph::hierarchy::children_of(txn.items(), id)
            .into_iter()
            .filter(|child| child.status.is_active())
            .map(|child| child.id.clone())
            .collect();
        if !live_children.is_empty() {
            return Err(StoreError::conflict(format!(
                "{id} still has open children: {}",
                live_children.join(", ")
            )));
        }

        txn.edit(id)?.status = Status::Deleted;
        let unblocked = txn.settle();
        let item = txn.get(id)?.clone();
        txn.commit(self.sink())?;
        tracing::debug!(id, unblocked = unblocked.len(), "deleted");
        Ok(Mutation { item, unblocked })
    }

    // -----------------------------------------------------------------------
    // Claim
    // -----------------------------------------------------------------------

    /// Take an item: `in_progress` and assigned to `user`.
    ///
    /// Claiming again as the same user is a no-op.
    pub fn claim(&self, id: &str, user: &str) -> StoreResult<Item> {
        let user = user.trim();
        if user.is_empty() {
            return Err(StoreError::invalid("claim needs a user"));
        }
        let mut state = self.write();
        let mut txn = Txn::begin(&mut state, self.now(), "claim");
        let item = txn.get(id)?;
        if item.status.is_terminal() {
            return Err(StoreError::conflict(format!("{id} is {}", item.status)));
        }
        if item.status == Status::NotReady {
            return Err(StoreError::conflict(format!("{id} is not ready")));
        }
        if item.is_assigned() && item.assignee != user {
            return Err(StoreError::conflict(format!(
                "{id} is already claimed by {}",
                item.assignee
            )));
        }
        if txn.is_epic(id) {
            return Err(StoreError::conflict(format!(
                "{id} is an epic; claim one of its children"
            )));
        }
        check_parent_alive(&txn, id)?;

        let item = txn.edit(id)?;
        item.status = Status::InProgress;
        item.assignee = user.to_string();
        txn.settle();
        let item = txn.get(id)?.clone();
        txn.commit(self.sink())?;
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Dependencies
    // -----------------------------------------------------------------------

    /// Record that `id` is blocked by `blocker`.
    pub fn link(&self, id: &str, blocker: &str) -> StoreResult<Item> {
        let mut state = self.write();
        let mut txn = Txn::begin(&mut state, self.now(), "link");
        txn.add_edge(id, blocker)?;
        let item = txn.get(id)?.clone();
        txn.commit(self.sink())?;
        Ok(item)
    }

    pub fn unlink(&self, id: &str, blocker: &str) -> StoreResult<Item> {
        let mut state = self.write();
        let mut txn = Txn::begin(&mut state, self.now(), "unlink");
        if !txn.get(id)?.blocked_by.iter().any(|b| b == blocker) {
            return Err(StoreError::invalid(format!(
                "{id} is not blocked by {blocker}"
            )));
        }
        txn.edit(id)?.blocked_by.retain(|b| b != blocker);
        let item = txn.get(id)?.clone();
        txn.commit(self.sink())?;
        Ok(item)
    }

    // -----------------------------------------------------------------------
    // Hierarchy
    // -----------------------------------------------------------------------

    pub fn move_into(&self, id: &str, parent_id: &str) -> StoreResult<Item> {
        let mut state = self.write();
        let mut txn = Txn::begin(&mut state, self.now(), "move_into");
        move_into(&mut txn, id, parent_id)?;
        txn.settle();
        let item = txn.get(id)?.clone();
        txn.commit(self.sink())?;
        Ok(item)
    }

    pub fn move_out(&self, id: &str) -> StoreResult<Item> {
        let mut state = self.write();
        let mut txn = Txn::begin(&mut state, self.now(), "move_out");
        move_out(&mut txn, id)?;
        txn.settle();
        let item = txn.get(id)?.clone();
        txn.commit(self.sink())?;
        Ok(item)
    }

    /// Write the derived status onto every epic. Returns how many changed.
    pub fn recompute(&self) -> StoreResult<usize> {
        let mut state = self.write();
        let mut txn = Txn::begin(&mut state, self.now(), "recompute");
        let epics: Vec<String> = {
            let index = crate::graph::hierarchy::ChildIndex::new(txn.items());
            txn.items()
                .keys()
                .filter(|id| index.is_epic(id))
                .cloned()
                .collect()
        };
        let mut changed = 0;
        for epic in epics {
            if txn.recompute_parent(&epic) {
                changed += 1;
            }
        }
        txn.commit(self.sink())?;
        if changed > 0 {
            tracing::info!(changed, "recomputed epic statuses");
        }
        Ok(changed)
    }

    // -----------------------------------------------------------------------
    // Comments
    // -----------------------------------------------------------------------

    pub fn add_comment(&self, id: &str, author: &str, text: &str) -> StoreResult<Item> {
        let (author, text) = (author.trim(), text.trim());
        if author.is_empty() {
            return Err(StoreError::invalid("comment author must not be empty"));
        }
        if text.is_empty() {
            return Err(StoreError::invalid("comment text must not be empty"));
        }
        let mut state = self.write();
        let mut txn = Txn::begin(&mut state, self.now(), "comment");
        let created_at = txn.now();
        txn.edit(id)?.comments.push(Comment {
            author: author.to_string(),
            text: text.to_string(),
            created_at,
        });
        let item = txn.get(id)?.clone();
        txn.commit(self.sink())?;
        Ok(item)
    }
}

/// Errors for an item that would become a child of `parent_id`.
///
/// An orphan target counts as standalone.
fn check_attach_target(txn: &Txn<'_>, parent_id: &str) -> StoreResult<()> {
    let parent = txn.get(parent_id)?;
    if parent.status == Status::Deleted {
        return Err(StoreError::invalid(format!("{parent_id} is deleted")));
    }
    if let Some(grandparent) = attached_parent(txn.items(), parent) {
        return Err(StoreError::conflict(format!(
            "{parent_id} is itself a child of {}; epics nest one level deep",
            grandparent.id
        )));
    }
    Ok(())
}

/// A child of a deleted epic stays finished.
fn check_parent_alive(txn: &Txn<'_>, id: &str) -> StoreResult<()> {
    let item = txn.get(id)?;
    match attached_parent(txn.items(), item) {
        Some(parent) if parent.status == Status::Deleted => Err(StoreError::conflict(format!(
            "{id} belongs to deleted epic {}; move it out first",
            parent.id
        ))),
        _ => Ok(()),
    }
}

fn move_into(txn: &mut Txn<'_>, id: &str, parent_id: &str) -> StoreResult<()> {
    let current_parent = txn.get(id)?.parent_id.clone();
    if id == parent_id {
        return Err(StoreError::invalid(format!("{id} cannot contain itself")));
    }
    check_attach_target(txn, parent_id)?;
    if current_parent == parent_id {
        return Err(StoreError::invalid(format!(
            "{id} is already a child of {parent_id}"
        )));
    }
    if txn.is_epic(id) {
        return Err(StoreError::conflict(format!(
            "{id} has children; epics nest one level deep"
        )));
    }
    txn.ensure_unlinked(id, parent_id)?;
    txn.edit(id)?.parent_id = parent_id.to_string();
    Ok(())
}

fn move_out(txn: &mut Txn<'_>, id: &str) -> StoreResult<()> {
    if !txn.get(id)?.is_child() {
        return Err(StoreError::invalid(format!("{id} has no parent")));
    }
    txn.edit(id)?.parent_id.clear();
    Ok(())
}
