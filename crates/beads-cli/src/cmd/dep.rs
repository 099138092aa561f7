//! `bd dep`: blocking edges between beads.

use std::io::{self, Write};

use beads_core::BeadRef;
use beads_core::model::Item;
use beads_core::store::Deps;
use clap::{Args, Subcommand};
use serde_json::json;

use crate::client::ApiClient;
use crate::cmd::{bead_path, render_bead};
use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct DepArgs {
    #[command(subcommand)]
    pub command: DepCommand,
}

#[derive(Subcommand, Debug)]
pub enum DepCommand {
    /// Make `id` wait on `blocker`.
    Add {
        id: String,
        blocker: String,
    },
    /// Remove the edge from `id` to `blocker`.
    Rm {
        id: String,
        blocker: String,
    },
    /// Show what a bead waits on and what waits on it.
    List {
        id: String,
    },
}

fn ref_lines(w: &mut dyn Write, label: &str, refs: &[BeadRef]) -> io::Result<()> {
    for bead in refs {
        writeln!(w, "{label}  {}  {}  {}", bead.id, bead.status, bead.title)?;
    }
    Ok(())
}

fn write_text(deps: &Deps, w: &mut dyn Write) -> io::Result<()> {
    ref_lines(w, "blocked_by", &deps.active_blockers)?;
    ref_lines(w, "resolved", &deps.resolved_blockers)?;
    ref_lines(w, "blocks", &deps.blocks)
}

fn write_pretty(deps: &Deps, w: &mut dyn Write) -> io::Result<()> {
    let sections = [
        ("Waiting on", &deps.active_blockers),
        ("Resolved", &deps.resolved_blockers),
        ("Blocks", &deps.blocks),
    ];
    for (heading, refs) in sections {
        if refs.is_empty() {
            continue;
        }
        pretty_section(w, heading)?;
        for bead in refs {
            writeln!(w, "  {:<12} {:<12} {}", bead.id, bead.status.as_str(), bead.title)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

pub fn run_dep(args: &DepArgs, client: &ApiClient, output: OutputMode) -> anyhow::Result<()> {
    match &args.command {
        DepCommand::Add { id, blocker } => {
            let item: Item =
                client.send("POST", &bead_path(id, "link"), &json!({ "blocked_by": blocker }))?;
            render_bead(output, &item)
        }
        DepCommand::Rm { id, blocker } => {
            let item: Item = client.delete(&bead_path(id, &format!("link/{}", blocker.trim())))?;
            render_bead(output, &item)
        }
        DepCommand::List { id } => {
            let deps: Deps = client.get(&bead_path(id, "deps"), &[])?;
            render_mode(output, &deps, write_text, write_pretty)
        }
    }
}
