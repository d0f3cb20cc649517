//! CLI definitions for the `wschat` binary.
//!
//! Running `wschat` with no subcommand starts a chat session.

pub mod chat;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use wschat_types::protocol::Dialect;

/// Chat with a WebSocket message server from the terminal.
#[derive(Parser)]
#[command(name = "wschat", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Endpoint URL (ws:// or wss://). Defaults to the dialect's endpoint.
    #[arg(long, env = "WSCHAT_URL")]
    pub url: Option<String>,

    /// Wire schema: paired, relay, addressed, or tagged.
    #[arg(short, long)]
    pub dialect: Option<Dialect>,

    /// Addressee nickname (addressed and tagged dialects).
    #[arg(short, long)]
    pub addressee: Option<String>,

    /// Bearer token sent in the Authorization header.
    #[arg(long, env = "WSCHAT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to config.toml (default: <config dir>/wschat/config.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Export tracing spans with OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Suppress all logging except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed logging (-v for verbose, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
