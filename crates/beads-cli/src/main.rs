#![forbid(unsafe_code)]

mod agent;
mod client;
mod cmd;
mod output;

use std::env;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use client::{ApiClient, ClientError, DEFAULT_URL};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "bd",
    author,
    version,
    about = "beads: a small issue tracker for agents and humans",
    long_about = None
)]
struct Cli {
    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output (same as `--format json`).
    #[arg(long, global = true)]
    json: bool,

    /// Output format; defaults to pretty on a terminal and text when piped.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Base URL of the beads server.
    #[arg(long, global = true, env = "BEADS_URL", default_value = DEFAULT_URL)]
    url: String,

    /// Bearer token for the server (and the served tenant in `bd serve`).
    #[arg(long, global = true, env = "BEADS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Identity for claims and comments (skips env resolution).
    #[arg(long, global = true)]
    agent: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }

    fn agent_flag(&self) -> Option<&str> {
        self.agent.as_deref()
    }

    fn client(&self) -> ApiClient {
        ApiClient::new(&self.url, self.token.clone())
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Create a bead",
        after_help = "EXAMPLES:\n    # Create a task\n    bd create --title \"Fix login timeout\"\n\n    # A high-priority bug under an epic, waiting on another bead\n    bd create -t \"Token refresh\" --type bug -p high --parent bd-a1b2 --blocked-by bd-c3d4\n\n    # Emit machine-readable output\n    bd create --title \"Fix login timeout\" --json"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Read",
        about = "List beads",
        long_about = "List beads. Closed and deleted beads are hidden unless --all or --status asks for them.",
        after_help = "EXAMPLES:\n    # Top-level beads with epic children nested\n    bd list\n\n    # Work that can start now\n    bd list --ready\n\n    # Everything tagged api and ui, closed included\n    bd list --all --tag api --tag ui"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one bead",
        after_help = "EXAMPLES:\n    # Show a bead\n    bd show bd-a1b2\n\n    # Use a short prefix when unique\n    bd show bd-a1"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Search beads by text",
        after_help = "EXAMPLES:\n    bd search login"
    )]
    Search(cmd::search::SearchArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Change fields of a bead",
        after_help = "EXAMPLES:\n    # Start work\n    bd update bd-a1b2 --status in_progress\n\n    # Move out of its epic and drop all blockers\n    bd update bd-a1b2 --detach --clear-blockers"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Close beads",
        after_help = "EXAMPLES:\n    bd close bd-a1b2 bd-c3d4"
    )]
    Close(cmd::update::StatusArgs),

    #[command(next_help_heading = "Lifecycle", about = "Reopen closed beads")]
    Reopen(cmd::update::StatusArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Claim a bead and start it",
        after_help = "EXAMPLES:\n    # Claim as the resolved agent identity\n    BEADS_AGENT=alice bd claim bd-a1b2\n\n    # Claim as an explicit user\n    bd claim bd-a1b2 --user bob"
    )]
    Claim(cmd::claim::ClaimArgs),

    #[command(next_help_heading = "Lifecycle", about = "Soft-delete a bead")]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Metadata",
        about = "Comment on a bead",
        after_help = "EXAMPLES:\n    bd comment bd-a1b2 \"repro needs a cold cache\" --author alice"
    )]
    Comment(cmd::comment::CommentArgs),

    #[command(
        next_help_heading = "Metadata",
        about = "Manage blocking dependencies",
        after_help = "EXAMPLES:\n    # bd-a1b2 waits on bd-c3d4\n    bd dep add bd-a1b2 bd-c3d4\n\n    # Show both directions\n    bd dep list bd-a1b2"
    )]
    Dep(cmd::dep::DepArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Remove old closed and deleted beads",
        after_help = "EXAMPLES:\n    bd clean --days 30"
    )]
    Clean(cmd::clean::CleanArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Run the HTTP API server",
        after_help = "EXAMPLES:\n    # One tenant\n    BEADS_TOKEN=s3cret bd serve --data-file ./beads.json\n\n    # Several tenants from a projects file\n    bd serve --projects ./projects.toml --addr 0.0.0.0:8420"
    )]
    Serve(cmd::serve::ServeArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    bd completions bash > ~/.local/share/bash-completion/completions/bd"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("BEADS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "beads=debug,info"
        } else {
            "beads=info,warn"
        })
    });

    let format = env::var("BEADS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn to_cli_error(err: &anyhow::Error) -> CliError {
    if let Some(client) = err.downcast_ref::<ClientError>() {
        return CliError::from(client);
    }
    if let Some(missing) = err.downcast_ref::<agent::MissingIdentity>() {
        return CliError::with_details(
            missing.to_string(),
            "Pass --agent, --user/--author, or export BEADS_AGENT.",
            agent::MissingIdentity::CODE,
        );
    }
    CliError::new(format!("{err:#}"))
}

fn run(cli: &Cli, output: OutputMode) -> anyhow::Result<()> {
    let client = cli.client();
    match &cli.command {
        Commands::Create(args) => cmd::create::run_create(args, &client, output),
        Commands::List(args) => cmd::list::run_list(args, &client, output),
        Commands::Show(args) => cmd::show::run_show(args, &client, output),
        Commands::Search(args) => cmd::search::run_search(args, &client, output),
        Commands::Update(args) => cmd::update::run_update(args, &client, output),
        Commands::Close(args) => cmd::update::run_close(args, &client, output),
        Commands::Reopen(args) => cmd::update::run_reopen(args, &client, output),
        Commands::Claim(args) => cmd::claim::run_claim(args, cli.agent_flag(), &client, output),
        Commands::Delete(args) => cmd::delete::run_delete(args, &client, output),
        Commands::Comment(args) => {
            cmd::comment::run_comment(args, cli.agent_flag(), &client, output)
        }
        Commands::Dep(args) => cmd::dep::run_dep(args, &client, output),
        Commands::Clean(args) => cmd::clean::run_clean(args, &client, output),
        Commands::Serve(args) => cmd::serve::run_serve(args, cli.token.as_deref()),
        Commands::Completions(args) => {
            cmd::completions::run_completions(args, &mut Cli::command());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = cli.output_mode();

    match run(&cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = %format!("{err:#}"), "command failed");
            if let Err(render_err) = render_error(output, &to_cli_error(&err)) {
                eprintln!("error: {err:#} ({render_err})");
            }
            ExitCode::FAILURE
        }
    }
}
