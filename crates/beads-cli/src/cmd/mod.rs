pub mod claim;
pub mod clean;
pub mod comment;
pub mod completions;
pub mod create;
pub mod delete;
pub mod dep;
pub mod list;
pub mod search;
pub mod serve;
pub mod show;
pub mod update;

use std::io::Write as _;

use beads_core::BeadRef;
use beads_core::model::Item;
use serde::{Deserialize, Serialize};

use crate::output::{OutputMode, bead_details, bead_row, render_mode, unblocked_lines};

/// API path for a bead id or prefix, with an optional sub-resource.
pub fn bead_path(id: &str, rest: &str) -> String {
    let id = id.trim();
    if rest.is_empty() {
        format!("/beads/{id}")
    } else {
        format!("/beads/{id}/{rest}")
    }
}

/// Response of writes that can free dependents (`PATCH`, `DELETE`).
#[derive(Debug, Serialize, Deserialize)]
pub struct Mutated {
    #[serde(flatten)]
    pub item: Item,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unblocked: Vec<BeadRef>,
}

/// Print a single item: one row in text mode, details in pretty mode.
pub fn render_bead(output: OutputMode, item: &Item) -> anyhow::Result<()> {
    render_mode(output, item, |item, w| bead_row(w, item), |item, w| bead_details(w, item))
}

pub fn render_mutated(output: OutputMode, verb: &str, mutated: &Mutated) -> anyhow::Result<()> {
    render_mode(
        output,
        mutated,
        |m, w| {
            bead_row(w, &m.item)?;
            unblocked_lines(w, &m.unblocked)
        },
        |m, w| {
            writeln!(w, "{verb} {}  {}  [{}]", m.item.id, m.item.title, m.item.status)?;
            unblocked_lines(w, &m.unblocked)
        },
    )
}
