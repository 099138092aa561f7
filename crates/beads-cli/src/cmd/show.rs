use std::io::{self, Write};

use beads_core::store::ItemView;
use clap::Args;

use crate::client::ApiClient;
use crate::cmd::bead_path;
use crate::output::{OutputMode, bead_details, bead_row, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Bead id or unique prefix.
    pub id: String,
}

fn write_text(view: &ItemView, w: &mut dyn Write) -> io::Result<()> {
    bead_row(w, &view.item)?;
    for child in &view.children {
        writeln!(w, "  {}  {}  {}", child.id, child.status, child.title)?;
    }
    Ok(())
}

fn write_pretty(view: &ItemView, w: &mut dyn Write) -> io::Result<()> {
    bead_details(w, &view.item)?;
    if let Some(title) = &view.parent_title {
        pretty_kv(w, "In epic", title)?;
    }
    if let Some(progress) = view.progress {
        writeln!(w)?;
        pretty_section(w, "Children")?;
        pretty_kv(
            w,
            "Progress",
            format!(
                "{}/{} done ({:.0}%)",
                progress.finished(),
                progress.total,
                progress.percent_complete()
            ),
        )?;
        for child in &view.children {
            writeln!(w, "  {:<12} {:<12} {}", child.id, child.status.as_str(), child.title)?;
        }
    }
    Ok(())
}

pub fn run_show(args: &ShowArgs, client: &ApiClient, output: OutputMode) -> anyhow::Result<()> {
    let view: ItemView = client.get(&bead_path(&args.id, ""), &[])?;
    render_mode(output, &view, write_text, write_pretty)
}
