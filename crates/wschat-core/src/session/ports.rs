//! Operator-facing ports: where input lines come from and where notices and
//! payloads go.

use std::future::Future;

use wschat_types::protocol::InboundMessage;
use wschat_types::session::Notice;

/// Events produced by a line source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Operator submitted a line (without its newline).
    Line(String),
    /// End of input (Ctrl+D or closed stdin).
    Eof,
    /// Interrupt (Ctrl+C while reading).
    Interrupted,
}

/// Blocking-style source of operator input.
pub trait LineSource: Send + 'static {
    /// Show `prompt` and wait for the next event.
    fn next_line(&mut self, prompt: &str) -> impl Future<Output = LineEvent> + Send;
}

/// Sink for everything the session prints.
///
/// Cloned into each loop; implementations must tolerate concurrent use from
/// the send loop, the receive loop, and the session's own control flow.
pub trait SessionOutput: Clone + Send + 'static {
    fn notice(&self, notice: Notice);

    /// Print a received payload verbatim.
    fn payload(&self, message: &InboundMessage);
}
