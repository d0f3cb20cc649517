//! Chat session orchestration.
//!
//! Resolves configuration, asks for whatever the dialect still needs (token,
//! addressee), connects, and runs the session until the operator leaves or
//! the server hangs up.

use std::io::IsTerminal;

use anyhow::Context;
use tracing::{debug, info, warn};

use wschat_core::compose::Composer;
use wschat_core::session::ports::LineSource;
use wschat_core::session::{ChatSession, SessionOptions};
use wschat_infra::config::{
    default_config_path, load_client_config, resolve_channel_capacity, resolve_dialect,
    resolve_url,
};
use wschat_infra::connection::{WsConnection, WsConnector};
use wschat_types::config::ClientConfig;
use wschat_types::endpoint::Endpoint;
use wschat_types::error::ConnectionError;
use wschat_types::protocol::Dialect;
use wschat_types::session::SessionReport;

use crate::cli::Cli;

use super::banner::print_session_banner;
use super::input::{ChatInput, StdinLines};
use super::output::ConsoleOutput;

/// Run one interactive chat session.
pub async fn run_chat(cli: &Cli) -> anyhow::Result<()> {
    let config = match cli.config.clone().or_else(default_config_path) {
        Some(path) => load_client_config(&path).await,
        None => ClientConfig::default(),
    };

    let dialect = resolve_dialect(&config, cli.dialect);
    let url = resolve_url(&config, dialect, cli.url.as_deref());
    let interactive = std::io::stdin().is_terminal();

    let token = match cli.token.clone() {
        Some(token) => Some(token),
        None if dialect.requires_token() => Some(prompt_token(dialect, interactive)?),
        None => None,
    };

    let addressee = match cli.addressee.clone() {
        Some(addressee) => Some(addressee),
        None if dialect.addressee_in_url() => Some(prompt_addressee(dialect, interactive)?),
        None => None,
    };
    if addressee.is_some() && !matches!(dialect, Dialect::Addressed | Dialect::Tagged) {
        warn!(%dialect, "--addressee is ignored for this dialect");
    }

    let endpoint = build_endpoint(&url, dialect, addressee.as_deref(), token.as_deref())?;
    let composer = build_composer(dialect, addressee.as_deref());
    let options = SessionOptions {
        channel_capacity: resolve_channel_capacity(&config),
    };

    if interactive {
        print_session_banner(endpoint.url().as_str(), dialect);
    }
    debug!(?endpoint, %dialect, channel_capacity = options.channel_capacity, "Starting chat session");

    let session = ChatSession::connect(&WsConnector::default(), &endpoint, options, &ConsoleOutput::Stdout)
        .await
        .with_context(|| format!("could not connect to {endpoint}"))?;

    let report = if interactive {
        let (chat_input, output) = ChatInput::new()
            .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;
        drive(session, composer, chat_input, output).await
    } else {
        drive(session, composer, StdinLines::spawn(), ConsoleOutput::Stdout).await
    };

    info!(
        sent = report.sent,
        received = report.received,
        interrupted = report.interrupted,
        "Chat session finished"
    );
    Ok(())
}

async fn drive<L: LineSource>(
    session: ChatSession<WsConnection>,
    composer: Composer,
    lines: L,
    output: ConsoleOutput,
) -> SessionReport {
    session
        .run(composer, lines, output, interrupt_signal())
        .await
}

/// Endpoint for `dialect`: the addressee goes on the URL only for dialects
/// that route by query string.
fn build_endpoint(
    url: &str,
    dialect: Dialect,
    addressee: Option<&str>,
    token: Option<&str>,
) -> Result<Endpoint, ConnectionError> {
    let mut endpoint = Endpoint::parse(url)?;
    if let Some(addressee) = addressee.filter(|_| dialect.addressee_in_url()) {
        endpoint = endpoint.with_addressee(addressee);
    }
    if let Some(token) = token {
        endpoint = endpoint.with_token(token);
    }
    Ok(endpoint)
}

fn build_composer(dialect: Dialect, addressee: Option<&str>) -> Composer {
    let composer = Composer::new(dialect);
    match addressee {
        Some(addressee) if dialect == Dialect::Tagged => composer.with_addressee(addressee),
        _ => composer,
    }
}

fn prompt_token(dialect: Dialect, interactive: bool) -> anyhow::Result<String> {
    if !interactive {
        anyhow::bail!("the {dialect} dialect needs a bearer token: pass --token or set WSCHAT_TOKEN");
    }
    let token = dialoguer::Password::new().with_prompt("jwt").interact()?;
    Ok(token)
}

fn prompt_addressee(dialect: Dialect, interactive: bool) -> anyhow::Result<String> {
    if !interactive {
        anyhow::bail!("the {dialect} dialect needs an addressee: pass --addressee");
    }
    let addressee = dialoguer::Input::<String>::new()
        .with_prompt("<addressee>")
        .interact_text()?;
    Ok(addressee)
}

/// Wait for Ctrl+C or SIGTERM.
///
/// A handler that cannot be installed never fires; the session can still be
/// left with Ctrl+D or a readline interrupt.
async fn interrupt_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
