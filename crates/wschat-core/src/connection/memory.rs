//! In-process connection pair.
//!
//! [`MemoryConnection`] implements [`Connection`] over tokio channels so a
//! session can run without a network; [`MemoryPeer`] plays the server side:
//! it pushes inbound payloads, collects sent frames, and can hang up.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use wschat_types::error::ConnectionError;
use wschat_types::protocol::{InboundMessage, OutboundMessage};

use super::Connection;

struct Shared {
    outbound: mpsc::UnboundedSender<String>,
    inbound: Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    closed: CancellationToken,
    close_calls: AtomicUsize,
    send_attempts: AtomicUsize,
    send_failure: std::sync::Mutex<Option<ConnectionError>>,
    receive_failure: std::sync::Mutex<Option<ConnectionError>>,
}

/// Client half of an in-process connection.
#[derive(Clone)]
pub struct MemoryConnection {
    shared: Arc<Shared>,
}

/// Server half of an in-process connection.
pub struct MemoryPeer {
    sent: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<InboundMessage>,
    shared: Arc<Shared>,
}

/// Create a connected client/peer pair.
pub fn pair() -> (MemoryConnection, MemoryPeer) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    let shared = Arc::new(Shared {
        outbound: outbound_tx,
        inbound: Mutex::new(inbound_rx),
        closed: CancellationToken::new(),
        close_calls: AtomicUsize::new(0),
        send_attempts: AtomicUsize::new(0),
        send_failure: std::sync::Mutex::new(None),
        receive_failure: std::sync::Mutex::new(None),
    });

    let connection = MemoryConnection {
        shared: shared.clone(),
    };
    let peer = MemoryPeer {
        sent: outbound_rx,
        inbound: inbound_tx,
        shared,
    };
    (connection, peer)
}

impl Connection for MemoryConnection {
    async fn send(&self, message: &OutboundMessage) -> Result<(), ConnectionError> {
        self.shared.send_attempts.fetch_add(1, Ordering::SeqCst);
        if self.shared.closed.is_cancelled() {
            return Err(ConnectionError::Closed);
        }
        if let Some(err) = self
            .shared
            .send_failure
            .lock()
            .map_err(|_| ConnectionError::Transport("send failure lock poisoned".to_string()))?
            .clone()
        {
            return Err(err);
        }
        let frame = message.to_json()?;
        self.shared
            .outbound
            .send(frame)
            .map_err(|_| ConnectionError::Closed)
    }

    async fn receive(&self) -> Result<InboundMessage, ConnectionError> {
        if let Some(err) = self
            .shared
            .receive_failure
            .lock()
            .map_err(|_| ConnectionError::Transport("receive failure lock poisoned".to_string()))?
            .clone()
        {
            return Err(err);
        }
        let mut inbound = self.shared.inbound.lock().await;
        tokio::select! {
            biased;
            _ = self.shared.closed.cancelled() => Err(ConnectionError::Closed),
            next = inbound.recv() => next.ok_or(ConnectionError::Closed),
        }
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.shared.close_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.closed.cancel();
        Ok(())
    }
}

impl MemoryPeer {
    /// Deliver a payload to the client. Returns false once the client is gone.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.inbound.send(InboundMessage::new(text)).is_ok()
    }

    /// Wait for the next frame the client sends.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Every frame sent so far that has not been read yet.
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Close from the server side.
    pub fn hang_up(&self) {
        self.shared.closed.cancel();
    }

    /// Make every later `send` fail with `err`.
    pub fn fail_sends_with(&self, err: ConnectionError) {
        if let Ok(mut failure) = self.shared.send_failure.lock() {
            *failure = Some(err);
        }
    }

    /// Make every later `receive` fail with `err`. A receive already
    /// waiting is not affected.
    pub fn fail_receives_with(&self, err: ConnectionError) {
        if let Ok(mut failure) = self.shared.receive_failure.lock() {
            *failure = Some(err);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// How many times the client called `send`, successful or not.
    pub fn send_attempts(&self) -> usize {
        self.shared.send_attempts.load(Ordering::SeqCst)
    }

    /// How many times the client called `close`.
    pub fn close_calls(&self) -> usize {
        self.shared.close_calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sent_frames_reach_peer_in_order() {
        let (conn, mut peer) = pair();
        conn.send(&OutboundMessage::body("one")).await.unwrap();
        conn.send(&OutboundMessage::body("two")).await.unwrap();
        assert_eq!(
            peer.drain_sent(),
            vec![r#"{"msg":"one"}"#.to_string(), r#"{"msg":"two"}"#.to_string()]
        );
    }

    #[tokio::test]
    async fn pushed_payloads_are_received_verbatim() {
        let (conn, peer) = pair();
        assert!(peer.push("{\"type\":\"msg\"}"));
        let msg = conn.receive().await.unwrap();
        assert_eq!(msg.as_str(), "{\"type\":\"msg\"}");
    }

    #[tokio::test]
    async fn close_wakes_pending_receive() {
        let (conn, peer) = pair();
        let receiver = conn.clone();
        let pending = tokio::spawn(async move { receiver.receive().await });

        tokio::task::yield_now().await;
        conn.close().await.unwrap();

        assert_eq!(pending.await.unwrap(), Err(ConnectionError::Closed));
        assert_eq!(peer.close_calls(), 1);
        assert!(peer.is_closed());
    }

    #[tokio::test]
    async fn send_after_hang_up_reports_closed() {
        let (conn, peer) = pair();
        peer.hang_up();
        assert_eq!(
            conn.send(&OutboundMessage::body("late")).await,
            Err(ConnectionError::Closed)
        );
        assert_eq!(peer.close_calls(), 0);
    }

    #[tokio::test]
    async fn injected_receive_failure_is_returned() {
        let (conn, peer) = pair();
        peer.fail_receives_with(ConnectionError::Transport("reset".to_string()));
        assert!(peer.push("never seen"));
        assert_eq!(
            conn.receive().await,
            Err(ConnectionError::Transport("reset".to_string()))
        );
    }

    #[tokio::test]
    async fn injected_send_failure_is_returned() {
        let (conn, peer) = pair();
        peer.fail_sends_with(ConnectionError::Transport("broken pipe".to_string()));
        assert_eq!(
            conn.send(&OutboundMessage::body("x")).await,
            Err(ConnectionError::Transport("broken pipe".to_string()))
        );
    }
}
