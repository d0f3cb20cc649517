//! The three units of work behind a running session.
//!
//! - **input**: reads operator lines, composes messages, queues them.
//! - **send**: drains the queue onto the connection, one frame per message.
//! - **receive**: prints every payload the connection yields.
//!
//! Loop-local errors stay loop-local: each loop reports a [`LoopOutcome`] and
//! never propagates into the others.

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use wschat_types::error::{ConnectionError, InputFormatError};
use wschat_types::protocol::OutboundMessage;
use wschat_types::session::{LoopOutcome, Notice};

use crate::compose::Composer;
use crate::connection::Connection;

use super::ports::{LineEvent, LineSource, SessionOutput};

/// Why the input loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum InputEnd {
    /// Operator closed input; queued messages should still be flushed.
    Eof,
    /// Operator asked to tear the session down.
    Interrupted,
    /// The send side is gone; nothing left to feed.
    QueueClosed,
    Rejected(InputFormatError),
    /// The task panicked.
    Crashed(String),
}

impl InputEnd {
    pub(crate) fn outcome(&self) -> LoopOutcome {
        match self {
            InputEnd::Eof | InputEnd::Interrupted => LoopOutcome::Completed,
            InputEnd::QueueClosed => LoopOutcome::Closed,
            InputEnd::Rejected(err) => LoopOutcome::Failed(err.to_string()),
            InputEnd::Crashed(reason) => LoopOutcome::Failed(format!("input loop panicked: {reason}")),
        }
    }
}

pub(crate) async fn input_loop<L, O>(
    mut composer: Composer,
    mut lines: L,
    queue: mpsc::Sender<OutboundMessage>,
    output: O,
) -> InputEnd
where
    L: LineSource,
    O: SessionOutput,
{
    if let Some(opening) = composer.opening() {
        if queue.send(opening).await.is_err() {
            return InputEnd::QueueClosed;
        }
    }

    loop {
        let line = match lines.next_line(composer.prompt()).await {
            LineEvent::Line(line) => line,
            LineEvent::Eof => {
                debug!("input reached end of file");
                return InputEnd::Eof;
            }
            LineEvent::Interrupted => {
                debug!("input interrupted by operator");
                return InputEnd::Interrupted;
            }
        };

        let message = match composer.compose(&line) {
            Ok(message) => message,
            Err(err) => {
                error!(error = %err, dialect = %composer.dialect(), "Rejected operator input");
                output.notice(Notice::InvalidInput(err.to_string()));
                return InputEnd::Rejected(err);
            }
        };

        if queue.send(message).await.is_err() {
            return InputEnd::QueueClosed;
        }
    }
}

pub(crate) async fn send_loop<C, O>(
    connection: C,
    mut queue: mpsc::Receiver<OutboundMessage>,
    output: O,
) -> (LoopOutcome, usize)
where
    C: Connection,
    O: SessionOutput,
{
    let mut sent = 0;

    while let Some(message) = queue.recv().await {
        match connection.send(&message).await {
            Ok(()) => {
                sent += 1;
                debug!(sent, init = message.is_init(), "Frame sent");
            }
            Err(ConnectionError::Closed) => {
                info!(sent, "Send loop observed closed connection");
                output.notice(Notice::SendStopped);
                return (LoopOutcome::Closed, sent);
            }
            Err(err) => {
                error!(error = %err, sent, "Send loop failed");
                return (LoopOutcome::Failed(err.to_string()), sent);
            }
        }
    }

    debug!(sent, "Send queue drained");
    (LoopOutcome::Completed, sent)
}

pub(crate) async fn receive_loop<C, O>(connection: C, output: O) -> (LoopOutcome, usize)
where
    C: Connection,
    O: SessionOutput,
{
    let mut received = 0;

    loop {
        match connection.receive().await {
            Ok(message) => {
                received += 1;
                output.payload(&message);
            }
            Err(ConnectionError::Closed) => {
                info!(received, "Receive loop observed closed connection");
                output.notice(Notice::ReceiveStopped);
                return (LoopOutcome::Closed, received);
            }
            Err(err) => {
                warn!(error = %err, received, "Receive loop failed");
                return (LoopOutcome::Failed(err.to_string()), received);
            }
        }
    }
}
