//! Session lifecycle types: the connection state machine, the status
//! notices printed to the operator, and the per-loop outcome report.

use std::fmt;

/// Session-level state machine.
///
/// `Disconnected -> Connecting -> Connected -> Closing -> Closed`. A failed
/// handshake goes straight from `Connecting` to `Closed`. There is no edge
/// back to `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Closed)
                | (Connected, Closing)
                | (Closing, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Human-readable status lines printed during a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Connecting,
    Connected,
    /// The send loop saw the connection close.
    SendStopped,
    /// The receive loop saw the connection close.
    ReceiveStopped,
    /// Operator input was rejected; the input loop is gone.
    InvalidInput(String),
    Closing,
    Done,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Connecting => write!(f, "Creating connection..."),
            Notice::Connected => write!(f, "Connection established!"),
            Notice::SendStopped => write!(f, "Stopping msg sending..."),
            Notice::ReceiveStopped => write!(f, "Stopping msg publishing..."),
            Notice::InvalidInput(reason) => write!(f, "Invalid input: {reason}"),
            Notice::Closing => write!(f, "Closing connection..."),
            Notice::Done => write!(f, "Done"),
        }
    }
}

/// How one loop of a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoopOutcome {
    /// Ran out of work (input ended, queue drained).
    Completed,
    /// Observed the connection closing.
    Closed,
    /// Stopped on an unhandled error.
    Failed(String),
    /// Torn down by session shutdown before finishing on its own.
    #[default]
    Cancelled,
}

impl LoopOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, LoopOutcome::Failed(_))
    }
}

impl fmt::Display for LoopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopOutcome::Completed => write!(f, "completed"),
            LoopOutcome::Closed => write!(f, "closed"),
            LoopOutcome::Failed(reason) => write!(f, "failed: {reason}"),
            LoopOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    pub input: LoopOutcome,
    pub send: LoopOutcome,
    pub receive: LoopOutcome,
    /// Frames successfully written to the connection.
    pub sent: usize,
    /// Payloads received and printed.
    pub received: usize,
    /// Whether shutdown was requested by the operator.
    pub interrupted: bool,
}
