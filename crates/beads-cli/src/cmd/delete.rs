use clap::Args;

use crate::client::ApiClient;
use crate::cmd::{Mutated, bead_path, render_mutated};
use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Bead id or unique prefix. The bead is soft-deleted until `bd clean`.
    pub id: String,
}

pub fn run_delete(args: &DeleteArgs, client: &ApiClient, output: OutputMode) -> anyhow::Result<()> {
    let mutated: Mutated = client.delete(&bead_path(&args.id, ""))?;
    render_mutated(output, "Deleted", &mutated)
}
