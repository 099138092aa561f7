use std::io::{self, Write};

use beads_core::store::{ListEntry, Page};
use clap::Args;

use crate::client::ApiClient;
use crate::output::{OutputMode, bead_line, bead_row, render_mode};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Case-insensitive text matched against id, title, description and tags.
    pub query: String,

    #[arg(long)]
    pub page: Option<usize>,

    #[arg(long)]
    pub per_page: Option<usize>,
}

impl SearchArgs {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("q", self.query.clone())];
        if let Some(page) = self.page {
            query.push(("page", page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            query.push(("per_page", per_page.to_string()));
        }
        query
    }
}

fn write_text(page: &Page<ListEntry>, w: &mut dyn Write) -> io::Result<()> {
    page.items.iter().try_for_each(|entry| bead_row(w, &entry.item))
}

fn write_pretty(page: &Page<ListEntry>, w: &mut dyn Write) -> io::Result<()> {
    if page.items.is_empty() {
        return writeln!(w, "No matches.");
    }
    for entry in &page.items {
        bead_line(w, 0, &entry.item)?;
    }
    writeln!(w, "{} match(es)", page.total)
}

pub fn run_search(args: &SearchArgs, client: &ApiClient, output: OutputMode) -> anyhow::Result<()> {
    let page: Page<ListEntry> = client.get("/search", &args.query())?;
    render_mode(output, &page, write_text, write_pretty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: SearchArgs,
    }

    #[test]
    fn query_always_sends_q() {
        let w = Wrapper::parse_from(["test", "login", "--page", "2"]);
        assert_eq!(
            w.args.query(),
            vec![("q", "login".to_string()), ("page", "2".to_string())]
        );
    }
}
