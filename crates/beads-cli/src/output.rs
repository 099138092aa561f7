//! Shared output layer for pretty/text/JSON parity across all CLI commands.
//!
//! Every command handler receives an [`OutputMode`] and formats its output
//! accordingly: pretty output for humans, compact text for agents, or stable JSON.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format`, then the `--json` flag
//! 2. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 3. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use beads_core::BeadRef;
use beads_core::model::Item;
use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

use crate::client::ClientError;

/// Shared width for human pretty separators.
pub const PRETTY_RULE_WIDTH: usize = 72;

/// Write a horizontal separator used by pretty human output.
pub fn pretty_rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    pretty_rule(w)
}

/// Render a left-aligned key/value line in human output.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Human-optimized output (tables, sections, visual framing).
    Pretty,
    /// Token-efficient plain text for agents and pipes.
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputMode {
    /// Returns `true` if JSON output was requested.
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Core resolution logic, separated from I/O for testability.
fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag {
        return mode;
    }

    if json_flag {
        return OutputMode::Json;
    }

    if let Some(val) = format_env {
        match val.to_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "text" => return OutputMode::Text,
            "pretty" => return OutputMode::Pretty,
            _ => {} // unknown value: fall through to TTY detection
        }
    }

    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from CLI flags, environment, and TTY defaults.
pub fn resolve_output_mode(format_flag: Option<OutputMode>, json_flag: bool) -> OutputMode {
    let env_val = std::env::var("FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(format_flag, json_flag, env_val.as_deref(), is_tty)
}

/// Render a serializable value with explicit pretty/text renderers.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Text => text_fn(value, &mut out)?,
        OutputMode::Pretty => pretty_fn(value, &mut out)?,
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// A structured error with optional suggestion and error code.
#[derive(Debug, Serialize)]
pub struct CliError {
    /// Human-readable error message.
    pub message: String,
    /// Optional suggestion for how to fix the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code (e.g. "E2001", "missing_agent").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    /// Create a simple error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            error_code: None,
        }
    }

    /// Create an error with a suggestion and error code.
    pub fn with_details(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: Some(suggestion.into()),
            error_code: Some(error_code.into()),
        }
    }
}

impl From<&ClientError> for CliError {
    fn from(err: &ClientError) -> Self {
        Self {
            message: err.to_string(),
            suggestion: err.suggestion(),
            error_code: Some(err.error_code()),
        }
    }
}

/// Render an error to stderr in the requested format.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    match mode {
        OutputMode::Json => {
            let wrapper = serde_json::json!({
                "error": error,
            });
            serde_json::to_writer_pretty(&mut out, &wrapper)?;
            writeln!(out)?;
        }
        OutputMode::Pretty | OutputMode::Text => {
            writeln!(out, "error: {}", error.message)?;
            if let Some(ref suggestion) = error.suggestion {
                writeln!(out, "  suggestion: {suggestion}")?;
            }
        }
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Bead rendering
// ────────────────────────────────────────────────────────────────────────────

/// One text-mode row: `id  status  priority  type  title`.
pub fn bead_row(w: &mut dyn Write, item: &Item) -> io::Result<()> {
    writeln!(
        w,
        "{}  {}  {}  {}  {}",
        item.id, item.status, item.priority, item.issue_type, item.title
    )
}

/// One pretty row with a status marker.
pub fn bead_line(w: &mut dyn Write, indent: usize, item: &Item) -> io::Result<()> {
    let assignee = if item.is_assigned() {
        format!("  @{}", item.assignee)
    } else {
        String::new()
    };
    writeln!(
        w,
        "{:indent$}{} {:<12} {:<9} {}{assignee}",
        "",
        status_marker(item.status),
        item.id,
        item.priority.as_str(),
        item.title,
    )
}

const fn status_marker(status: beads_core::model::Status) -> &'static str {
    use beads_core::model::Status;
    match status {
        Status::Open => "[ ]",
        Status::NotReady => "[~]",
        Status::InProgress => "[>]",
        Status::Closed => "[x]",
        Status::Deleted => "[-]",
    }
}

/// Full key/value block for a single item.
pub fn bead_details(w: &mut dyn Write, item: &Item) -> io::Result<()> {
    pretty_section(w, &format!("{}  {}", item.id, item.title))?;
    pretty_kv(w, "Status", item.status.as_str())?;
    pretty_kv(w, "Priority", item.priority.as_str())?;
    pretty_kv(w, "Type", item.issue_type.as_str())?;
    if item.is_assigned() {
        pretty_kv(w, "Assignee", &item.assignee)?;
    }
    if let Some(parent) = item.parent() {
        pretty_kv(w, "Parent", parent)?;
    }
    if !item.tags.is_empty() {
        pretty_kv(w, "Tags", item.tags.join(", "))?;
    }
    if !item.blocked_by.is_empty() {
        pretty_kv(w, "Blocked by", item.blocked_by.join(", "))?;
    }
    pretty_kv(w, "Created", item.created_at.format("%Y-%m-%d %H:%M").to_string())?;
    pretty_kv(w, "Updated", item.updated_at.format("%Y-%m-%d %H:%M").to_string())?;
    if !item.description.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", item.description)?;
    }
    if !item.comments.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Comments")?;
        for comment in &item.comments {
            writeln!(
                w,
                "{} {}: {}",
                comment.created_at.format("%Y-%m-%d %H:%M"),
                comment.author,
                comment.text
            )?;
        }
    }
    Ok(())
}

/// `unblocked: <id> <title>` lines after a write that freed dependents.
pub fn unblocked_lines(w: &mut dyn Write, freed: &[BeadRef]) -> io::Result<()> {
    for bead in freed {
        writeln!(w, "unblocked: {}  {}", bead.id, bead.title)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Item {
        serde_json::from_value(serde_json::json!({
            "id": "bd-a1b2",
            "title": "Login bug",
            "status": "in_progress",
            "priority": "high",
            "type": "bug",
            "assignee": "alice",
            "tags": ["auth"],
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-02T00:00:00Z"
        }))
        .unwrap()
    }

    fn capture(f: impl FnOnce(&mut dyn Write) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ── resolve_output_mode_inner ───────────────────────────────────────────

    #[test]
    fn resolve_format_flag_wins_over_json_and_env() {
        let mode = resolve_output_mode_inner(Some(OutputMode::Text), true, Some("pretty"), true);
        assert_eq!(mode, OutputMode::Text);
    }

    #[test]
    fn resolve_json_flag_wins_over_env() {
        let mode = resolve_output_mode_inner(None, true, Some("pretty"), true);
        assert_eq!(mode, OutputMode::Json);
    }

    #[test]
    fn resolve_format_env_case_insensitive() {
        let mode = resolve_output_mode_inner(None, false, Some("TEXT"), true);
        assert_eq!(mode, OutputMode::Text);
        let mode = resolve_output_mode_inner(None, false, Some("json"), true);
        assert_eq!(mode, OutputMode::Json);
    }

    #[test]
    fn resolve_format_env_unknown_falls_through_to_tty() {
        let mode_tty = resolve_output_mode_inner(None, false, Some("fancy"), true);
        assert_eq!(mode_tty, OutputMode::Pretty);
        let mode_pipe = resolve_output_mode_inner(None, false, Some("fancy"), false);
        assert_eq!(mode_pipe, OutputMode::Text);
    }

    #[test]
    fn resolve_default_depends_on_tty() {
        assert_eq!(
            resolve_output_mode_inner(None, false, None, true),
            OutputMode::Pretty
        );
        assert_eq!(
            resolve_output_mode_inner(None, false, None, false),
            OutputMode::Text
        );
    }

    // ── bead rendering ──────────────────────────────────────────────────────

    #[test]
    fn text_row_is_tab_friendly() {
        let out = capture(|w| bead_row(w, &sample()));
        assert_eq!(out, "bd-a1b2  in_progress  high  bug  Login bug\n");
    }

    #[test]
    fn pretty_line_shows_marker_and_assignee() {
        let out = capture(|w| bead_line(w, 2, &sample()));
        assert!(out.starts_with("  [>] bd-a1b2"));
        assert!(out.trim_end().ends_with("@alice"));
    }

    #[test]
    fn details_include_tags_and_skip_empty_fields() {
        let out = capture(|w| bead_details(w, &sample()));
        assert!(out.contains("Tags:"));
        assert!(out.contains("auth"));
        assert!(!out.contains("Blocked by:"));
        assert!(!out.contains("Comments"));
    }

    // ── errors ──────────────────────────────────────────────────────────────

    #[test]
    fn cli_error_with_details() {
        let err = CliError::with_details(
            "missing agent",
            "Set BEADS_AGENT or pass --agent",
            "missing_agent",
        );
        assert_eq!(err.message, "missing agent");
        assert_eq!(err.error_code.as_deref(), Some("missing_agent"));
    }

    #[test]
    fn cli_error_from_transport_error_suggests_serve() {
        let err = ClientError::Transport {
            url: "http://127.0.0.1:1/api/v1/beads".into(),
            message: "connection refused".into(),
        };
        let cli = CliError::from(&err);
        assert_eq!(cli.error_code.as_deref(), Some("unreachable"));
        assert!(cli.suggestion.unwrap().contains("bd serve"));
    }

    #[test]
    fn render_error_modes_do_not_fail() {
        let err = CliError::with_details("bad input", "try again", "E2005");
        assert!(render_error(OutputMode::Json, &err).is_ok());
        assert!(render_error(OutputMode::Text, &err).is_ok());
    }
}
