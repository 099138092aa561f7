//! `bd create`: create a new bead.

use beads_core::model::{IssueType, Item, Priority};
use clap::Args;
use serde_json::{Map, Value, json};

use crate::client::ApiClient;
use crate::cmd::render_bead;
use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Title of the new bead.
    #[arg(short, long)]
    pub title: String,

    /// Description text.
    #[arg(short, long)]
    pub description: Option<String>,

    /// Priority: critical, high, medium, low, none.
    #[arg(short, long)]
    pub priority: Option<Priority>,

    /// Type: bug, feature, task, chore.
    #[arg(long = "type")]
    pub issue_type: Option<IssueType>,

    /// Tags to attach (repeatable).
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Ids (or prefixes) this bead waits on (repeatable).
    #[arg(long)]
    pub blocked_by: Vec<String>,

    /// Assignee.
    #[arg(long)]
    pub assignee: Option<String>,

    /// Epic (or future epic) to create the bead under.
    #[arg(long)]
    pub parent: Option<String>,

    /// Start as not_ready instead of open.
    #[arg(long)]
    pub not_ready: bool,
}

impl CreateArgs {
    fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("title".into(), json!(self.title));
        if let Some(description) = &self.description {
            body.insert("description".into(), json!(description));
        }
        if let Some(priority) = self.priority {
            body.insert("priority".into(), json!(priority));
        }
        if let Some(issue_type) = self.issue_type {
            body.insert("type".into(), json!(issue_type));
        }
        if !self.tags.is_empty() {
            body.insert("tags".into(), json!(self.tags));
        }
        if !self.blocked_by.is_empty() {
            body.insert("blocked_by".into(), json!(self.blocked_by));
        }
        if let Some(assignee) = &self.assignee {
            body.insert("assignee".into(), json!(assignee));
        }
        if let Some(parent) = &self.parent {
            body.insert("parent_id".into(), json!(parent));
        }
        if self.not_ready {
            body.insert("status".into(), json!("not_ready"));
        }
        Value::Object(body)
    }
}

pub fn run_create(args: &CreateArgs, client: &ApiClient, output: OutputMode) -> anyhow::Result<()> {
    let item: Item = client.send("POST", "/beads", &args.body())?;
    tracing::debug!(id = %item.id, "created");
    render_bead(output, &item)
}
