//! `bd claim`: take an open bead and start working on it.

use beads_core::model::Item;
use clap::Args;
use serde_json::json;

use crate::agent::require_identity;
use crate::client::ApiClient;
use crate::cmd::{bead_path, render_bead};
use crate::output::OutputMode;

#[derive(Args, Debug)]
pub struct ClaimArgs {
    /// Bead id or unique prefix.
    pub id: String,

    /// Claim as this user instead of the resolved agent identity.
    #[arg(short, long)]
    pub user: Option<String>,
}

pub fn run_claim(
    args: &ClaimArgs,
    agent_flag: Option<&str>,
    client: &ApiClient,
    output: OutputMode,
) -> anyhow::Result<()> {
    let user = require_identity(&[args.user.as_deref(), agent_flag], "claim")?;
    let item: Item = client.send("POST", &bead_path(&args.id, "claim"), &json!({ "user": user }))?;
    render_bead(output, &item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ClaimArgs,
    }

    #[test]
    fn parses_id_and_user() {
        let w = Wrapper::parse_from(["test", "bd-a1", "--user", "alice"]);
        assert_eq!(w.args.id, "bd-a1");
        assert_eq!(w.args.user.as_deref(), Some("alice"));
    }

    #[test]
    fn explicit_user_skips_environment() {
        let user = require_identity(&[Some("alice"), None], "claim").unwrap();
        assert_eq!(user, "alice");
    }
}
