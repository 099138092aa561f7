use super::item::{IssueType, Priority, Status};

/// Template for a new bead. The store assigns the id and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewItem {
    pub title: String,
    pub description: String,
    /// Only `open` and `not_ready` are accepted; `None` means `open`.
    pub status: Option<Status>,
    pub priority: Priority,
    pub issue_type: IssueType,
    pub tags: Vec<String>,
    pub blocked_by: Vec<String>,
    pub assignee: String,
}

impl NewItem {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn with_type(mut self, issue_type: IssueType) -> Self {
        self.issue_type = issue_type;
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }
}

/// Relocation of an item relative to epics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentChange {
    /// Move under the given epic (or future epic).
    Attach(String),
    /// Become a top-level item again.
    Detach,
}

/// Partial update: `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub issue_type: Option<IssueType>,
    /// Replaces the whole tag set.
    pub tags: Option<Vec<String>>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
    /// Replaces the whole blocker list.
    pub blocked_by: Option<Vec<String>>,
    /// `Some("")` unassigns.
    pub assignee: Option<String>,
    pub parent: Option<ParentChange>,
}

impl ItemUpdate {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
