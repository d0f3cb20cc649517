//! Connection traits.
//!
//! A [`Connection`] is one bidirectional message channel shared by the send
//! loop and the receive loop of a session. Implementations serialize their own
//! internal state, so both loops hold a clone and call `send`/`receive`
//! concurrently without extra locking.
//!
//! Uses native async fn in traits (Rust 2024 edition, no async_trait macro).

pub mod memory;

use std::future::Future;

use wschat_types::endpoint::Endpoint;
use wschat_types::error::ConnectionError;
use wschat_types::protocol::{InboundMessage, OutboundMessage};

/// A live, shared connection to the chat server.
pub trait Connection: Clone + Send + Sync + 'static {
    /// Encode and send one message as a single frame.
    ///
    /// Returns `ConnectionError::Closed` once the connection has been closed
    /// from either end.
    fn send(
        &self,
        message: &OutboundMessage,
    ) -> impl Future<Output = Result<(), ConnectionError>> + Send;

    /// Wait for the next payload from the server.
    ///
    /// A pending `receive` resolves with `ConnectionError::Closed` when
    /// [`close`](Connection::close) is called from another task.
    fn receive(&self) -> impl Future<Output = Result<InboundMessage, ConnectionError>> + Send;

    /// Close the connection. Idempotent.
    fn close(&self) -> impl Future<Output = Result<(), ConnectionError>> + Send;
}

/// Opens connections to an [`Endpoint`].
pub trait Connector: Send + Sync {
    type Connection: Connection;

    /// Perform the handshake. Failures map to `ConnectionError::Handshake`
    /// (or `InvalidEndpoint`); there is no retry.
    fn connect(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<Self::Connection, ConnectionError>> + Send;
}
