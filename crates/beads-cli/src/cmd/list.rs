//! `bd list`: list beads.
//!
//! Default output is hierarchical: top-level beads, with epic children
//! nested underneath. `--ready` and `--assignee` switch to the flat work
//! queue the server returns for those filters.

use std::io::{self, Write};

use beads_core::store::{ListEntry, Page};
use clap::Args;

use crate::client::ApiClient;
use crate::output::{OutputMode, bead_line, bead_row, pretty_rule, render_mode};

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Include closed and deleted beads.
    #[arg(long)]
    pub all: bool,

    /// Only open beads with no active blocker.
    #[arg(long)]
    pub ready: bool,

    /// Status filter (comma-separated).
    #[arg(long)]
    pub status: Option<String>,

    /// Priority filter (comma-separated).
    #[arg(short, long)]
    pub priority: Option<String>,

    /// Type filter (comma-separated).
    #[arg(long = "type")]
    pub issue_type: Option<String>,

    /// Tags that must all be present (repeatable).
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Only beads assigned to this user.
    #[arg(long)]
    pub assignee: Option<String>,

    /// Page number, starting at 1.
    #[arg(long)]
    pub page: Option<usize>,

    /// Page size.
    #[arg(long)]
    pub per_page: Option<usize>,
}

impl ListArgs {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if self.all {
            query.push(("all", "true".to_string()));
        }
        if self.ready {
            query.push(("ready", "true".to_string()));
        }
        let optional = [
            ("status", self.status.clone()),
            ("priority", self.priority.clone()),
            ("type", self.issue_type.clone()),
            ("assignee", self.assignee.clone()),
            ("page", self.page.map(|p| p.to_string())),
            ("per_page", self.per_page.map(|p| p.to_string())),
        ];
        query.extend(
            optional
                .into_iter()
                .filter_map(|(key, value)| value.map(|v| (key, v))),
        );
        if !self.tags.is_empty() {
            query.push(("tag", self.tags.join(",")));
        }
        query
    }
}

fn write_text(page: &Page<ListEntry>, w: &mut dyn Write) -> io::Result<()> {
    for entry in &page.items {
        bead_row(w, &entry.item)?;
        for child in &entry.children {
            write!(w, "  ")?;
            bead_row(w, child)?;
        }
    }
    Ok(())
}

fn write_pretty(page: &Page<ListEntry>, w: &mut dyn Write) -> io::Result<()> {
    if page.items.is_empty() {
        return writeln!(w, "No beads.");
    }
    for entry in &page.items {
        bead_line(w, 0, &entry.item)?;
        if let Some(progress) = entry.progress {
            writeln!(
                w,
                "      {}/{} done ({:.0}%)",
                progress.finished(),
                progress.total,
                progress.percent_complete()
            )?;
        }
        if let Some(parent) = &entry.parent {
            writeln!(w, "      in {}  {}", parent.id, parent.title)?;
        }
        for child in &entry.children {
            bead_line(w, 4, child)?;
        }
    }
    pretty_rule(w)?;
    let shown = page.items.len();
    writeln!(
        w,
        "{shown} of {} (page {}, {} per page)",
        page.total, page.page, page.per_page
    )
}

pub fn run_list(args: &ListArgs, client: &ApiClient, output: OutputMode) -> anyhow::Result<()> {
    let page: Page<ListEntry> = client.get("/beads", &args.query())?;
    render_mode(output, &page, write_text, write_pretty)
}
