//! Who is acting: the identity recorded on claims and comments.
//!
//! Resolution chain, first non-empty wins: a per-command value (`--user`,
//! `--author`), the global `--agent` flag, `BEADS_AGENT`, `AGENT`, then
//! `USER` when stdin is a terminal.

use std::env;
use std::io::IsTerminal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no identity for {action}; pass --agent or set BEADS_AGENT or AGENT")]
pub struct MissingIdentity {
    pub action: &'static str,
}

impl MissingIdentity {
    pub const CODE: &'static str = "missing_agent";
}

trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct ProcessEnv;

impl EnvReader for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn is_tty(&self) -> bool {
        std::io::stdin().is_terminal()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn resolve_with(explicit: &[Option<&str>], env: &dyn EnvReader) -> Option<String> {
    explicit
        .iter()
        .find_map(|value| non_empty(*value))
        .or_else(|| non_empty(env.get("BEADS_AGENT").as_deref()))
        .or_else(|| non_empty(env.get("AGENT").as_deref()))
        .or_else(|| {
            env.is_tty()
                .then(|| non_empty(env.get("USER").as_deref()))
                .flatten()
        })
}

/// Identity for `action`, trying `explicit` values in order before the environment.
pub fn require_identity(
    explicit: &[Option<&str>],
    action: &'static str,
) -> Result<String, MissingIdentity> {
    resolve_with(explicit, &ProcessEnv).ok_or(MissingIdentity { action })
}
