//! `bd update`, `bd close`, `bd reopen`.
//!
//! All three are `PATCH /beads/{id}`. Close and reopen take several ids and
//! stop at the first failure.

use beads_core::model::{IssueType, Priority, Status};
use clap::Args;
use serde_json::{Map, Value, json};

use crate::client::ApiClient;
use crate::cmd::{Mutated, bead_path, render_mutated};
use crate::output::OutputMode;

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Bead id or unique prefix.
    pub id: String,

    #[arg(short, long)]
    pub title: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,

    /// New status. Epic status is derived and cannot be set.
    #[arg(short, long)]
    pub status: Option<Status>,

    #[arg(short, long)]
    pub priority: Option<Priority>,

    #[arg(long = "type")]
    pub issue_type: Option<IssueType>,

    /// Replace all tags (repeatable).
    #[arg(long = "tag", conflicts_with = "clear_tags")]
    pub tags: Vec<String>,

    /// Remove every tag.
    #[arg(long)]
    pub clear_tags: bool,

    /// Add a tag, keeping the others (repeatable).
    #[arg(long = "add-tag")]
    pub add_tags: Vec<String>,

    /// Remove a tag (repeatable).
    #[arg(long = "remove-tag")]
    pub remove_tags: Vec<String>,

    /// Replace the blocker list (repeatable).
    #[arg(long, conflicts_with = "clear_blockers")]
    pub blocked_by: Vec<String>,

    /// Drop every blocker.
    #[arg(long)]
    pub clear_blockers: bool,

    #[arg(long, conflicts_with = "unassign")]
    pub assignee: Option<String>,

    #[arg(long)]
    pub unassign: bool,

    /// Move the bead under this epic (or future epic).
    #[arg(long, conflicts_with = "detach")]
    pub parent: Option<String>,

    /// Move the bead out of its epic.
    #[arg(long)]
    pub detach: bool,
}

impl UpdateArgs {
    fn body(&self) -> Value {
        let mut body = Map::new();
        if let Some(title) = &self.title {
            body.insert("title".into(), json!(title));
        }
        if let Some(description) = &self.description {
            body.insert("description".into(), json!(description));
        }
        if let Some(status) = self.status {
            body.insert("status".into(), json!(status));
        }
        if let Some(priority) = self.priority {
            body.insert("priority".into(), json!(priority));
        }
        if let Some(issue_type) = self.issue_type {
            body.insert("type".into(), json!(issue_type));
        }
        if self.clear_tags || !self.tags.is_empty() {
            body.insert("tags".into(), json!(self.tags));
        }
        if !self.add_tags.is_empty() {
            body.insert("add_tags".into(), json!(self.add_tags));
        }
        if !self.remove_tags.is_empty() {
            body.insert("remove_tags".into(), json!(self.remove_tags));
        }
        if self.clear_blockers || !self.blocked_by.is_empty() {
            body.insert("blocked_by".into(), json!(self.blocked_by));
        }
        if self.unassign {
            body.insert("assignee".into(), json!(""));
        } else if let Some(assignee) = &self.assignee {
            body.insert("assignee".into(), json!(assignee));
        }
        if self.detach {
            body.insert("parent_id".into(), json!(""));
        } else if let Some(parent) = &self.parent {
            body.insert("parent_id".into(), json!(parent));
        }
        Value::Object(body)
    }
}

pub fn run_update(args: &UpdateArgs, client: &ApiClient, output: OutputMode) -> anyhow::Result<()> {
    let body = args.body();
    if body.as_object().is_some_and(Map::is_empty) {
        anyhow::bail!("nothing to update; pass at least one field flag");
    }
    let mutated: Mutated = client.send("PATCH", &bead_path(&args.id, ""), &body)?;
    render_mutated(output, "Updated", &mutated)
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Bead ids or unique prefixes.
    #[arg(required = true)]
    pub ids: Vec<String>,
}

fn set_status(
    ids: &[String],
    status: Status,
    verb: &str,
    client: &ApiClient,
    output: OutputMode,
) -> anyhow::Result<()> {
    let body = json!({ "status": status });
    for id in ids {
        let mutated: Mutated = client.send("PATCH", &bead_path(id, ""), &body)?;
        render_mutated(output, verb, &mutated)?;
    }
    Ok(())
}

pub fn run_close(args: &StatusArgs, client: &ApiClient, output: OutputMode) -> anyhow::Result<()> {
    set_status(&args.ids, Status::Closed, "Closed", client, output)
}

pub fn run_reopen(args: &StatusArgs, client: &ApiClient, output: OutputMode) -> anyhow::Result<()> {
    set_status(&args.ids, Status::Open, "Reopened", client, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: UpdateArgs,
    }

    #[derive(Parser)]
    struct StatusWrapper {
        #[command(flatten)]
        args: StatusArgs,
    }

    fn body(argv: &[&str]) -> Value {
        let mut full = vec!["test"];
        full.extend_from_slice(argv);
        Wrapper::parse_from(full).args.body()
    }

    #[test]
    fn only_given_fields_are_sent() {
        assert_eq!(
            body(&["bd-a1", "--status", "in_progress", "-p", "low"]),
            json!({"status": "in_progress", "priority": "low"})
        );
        assert_eq!(body(&["bd-a1"]), json!({}));
    }

    #[test]
    fn clear_flags_send_empty_values() {
        assert_eq!(
            body(&["bd-a1", "--clear-tags", "--clear-blockers", "--unassign", "--detach"]),
            json!({"tags": [], "blocked_by": [], "assignee": "", "parent_id": ""})
        );
    }

    #[test]
    fn tag_edits_are_separate_from_replacement() {
        assert_eq!(
            body(&["bd-a1", "--add-tag", "ui", "--remove-tag", "old"]),
            json!({"add_tags": ["ui"], "remove_tags": ["old"]})
        );
    }

    #[test]
    fn parent_and_detach_conflict() {
        let result = Wrapper::try_parse_from(["test", "bd-a1", "--parent", "bd-e1", "--detach"]);
        assert!(result.is_err());
    }

    #[test]
    fn close_requires_an_id() {
        assert!(StatusWrapper::try_parse_from(["test"]).is_err());
        let w = StatusWrapper::parse_from(["test", "bd-a1", "bd-b2"]);
        assert_eq!(w.args.ids, vec!["bd-a1", "bd-b2"]);
    }
}
