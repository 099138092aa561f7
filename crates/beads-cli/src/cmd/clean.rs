use std::io::Write as _;

use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::ApiClient;
use crate::output::{OutputMode, render_mode};

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Remove closed/deleted work untouched for at least this many days.
    #[arg(long)]
    pub days: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Cleaned {
    removed: usize,
}

pub fn run_clean(args: &CleanArgs, client: &ApiClient, output: OutputMode) -> anyhow::Result<()> {
    let cleaned: Cleaned = client.send("POST", "/clean", &json!({ "days": args.days }))?;
    tracing::debug!(removed = cleaned.removed, days = args.days, "clean");
    render_mode(
        output,
        &cleaned,
        |c, w| writeln!(w, "removed {}", c.removed),
        |c, w| writeln!(w, "Removed {} bead(s) older than {} day(s).", c.removed, args.days),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: CleanArgs,
    }

    #[test]
    fn days_accepts_fractions() {
        let w = Wrapper::parse_from(["test", "--days", "0.5"]);
        assert!((w.args.days - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn days_is_required() {
        assert!(Wrapper::try_parse_from(["test"]).is_err());
    }
}
