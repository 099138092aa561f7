use clap::Args;
use clap_complete::{Shell, generate};

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate a completion script for.
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Write the completion script for `bd` to stdout.
pub fn run_completions(args: &CompletionsArgs, command: &mut clap::Command) {
    generate(args.shell, command, "bd", &mut std::io::stdout());
}
