//! wschat entry point.
//!
//! Binary name: `wschat`
//!
//! Parses CLI arguments, sets up logging, then either prints shell
//! completions or runs an interactive chat session.

mod cli;

use clap::Parser;
use clap_complete::{Shell, generate};

use wschat_observe::tracing_setup::{init_tracing, shutdown_tracing, verbosity_filter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = verbosity_filter(cli.verbose, cli.quiet);
    init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let result = match &cli.command {
        // Shell completions don't need a connection
        Some(Commands::Completions { shell }) => {
            write_completions(*shell, &mut std::io::stdout());
            Ok(())
        }
        None => cli::chat::loop_runner::run_chat(&cli).await,
    };

    shutdown_tracing();
    result
}

fn write_completions(shell: Shell, out: &mut dyn std::io::Write) {
    let mut cmd = <Cli as clap::CommandFactory>::command();
    generate(shell, &mut cmd, "wschat", out);
}
