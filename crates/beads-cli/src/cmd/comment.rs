use beads_core::model::Item;
use clap::Args;
use serde_json::json;

use crate::agent::require_identity;
use crate::client::ApiClient;
use crate::cmd::{bead_path, render_bead};
use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct CommentArgs {
    /// Bead id or unique prefix.
    pub id: String,

    /// Comment text.
    pub text: String,

    /// Comment as this author instead of the resolved agent identity.
    #[arg(long)]
    pub author: Option<String>,
}

pub fn run_comment(
    args: &CommentArgs,
    agent_flag: Option<&str>,
    client: &ApiClient,
    output: OutputMode,
) -> anyhow::Result<()> {
    let author = require_identity(&[args.author.as_deref(), agent_flag], "comment")?;
    let body = json!({ "author": author, "text": args.text });
    let item: Item = client.send("POST", &bead_path(&args.id, "comments"), &body)?;
    render_bead(output, &item)
}
