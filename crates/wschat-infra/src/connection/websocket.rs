//! WebSocket connection over tokio-tungstenite.
//!
//! The socket is split once at connect time. The sink and the stream each
//! sit behind their own async mutex so the send loop and the receive loop
//! never wait on each other; a shared [`CancellationToken`] records that the
//! connection is closed so a pending `receive` (or a stalled `send`) returns
//! `ConnectionError::Closed` as soon as `close` is called.

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use wschat_core::connection::{Connection, Connector};
use wschat_types::endpoint::Endpoint;
use wschat_types::error::ConnectionError;
use wschat_types::protocol::{InboundMessage, OutboundMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on sending the close frame.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens [`WsConnection`]s.
#[derive(Debug, Clone)]
pub struct WsConnector {
    close_timeout: Duration,
}

impl WsConnector {
    /// Bound how long `close` may wait on a peer that stopped reading.
    pub fn with_close_timeout(mut self, close_timeout: Duration) -> Self {
        self.close_timeout = close_timeout;
        self
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self {
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }
}

impl Connector for WsConnector {
    type Connection = WsConnection;

    async fn connect(&self, endpoint: &Endpoint) -> Result<WsConnection, ConnectionError> {
        let mut request = endpoint
            .url()
            .as_str()
            .into_client_request()
            .map_err(|e| ConnectionError::InvalidEndpoint(e.to_string()))?;

        if let Some(authorization) = endpoint.authorization() {
            let mut value = HeaderValue::from_str(&authorization).map_err(|_| {
                ConnectionError::InvalidEndpoint(
                    "bearer token contains characters not allowed in a header".to_string(),
                )
            })?;
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| ConnectionError::Handshake(e.to_string()))?;

        debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(WsConnection::new(stream, self.close_timeout))
    }
}

struct Inner {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: CancellationToken,
    close_timeout: Duration,
}

/// A shared, internally synchronized WebSocket connection.
#[derive(Clone)]
pub struct WsConnection {
    inner: Arc<Inner>,
}

impl WsConnection {
    fn new(stream: WsStream, close_timeout: Duration) -> Self {
        let (sink, stream) = stream.split();
        Self {
            inner: Arc::new(Inner {
                sink: Mutex::new(sink),
                stream: Mutex::new(stream),
                closed: CancellationToken::new(),
                close_timeout,
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Map a tungstenite error, marking the connection closed when the error
    /// means the socket is gone.
    fn fail(&self, err: WsError) -> ConnectionError {
        let err = map_ws_error(err);
        if err.is_closed() {
            self.inner.closed.cancel();
        }
        err
    }
}

impl Connection for WsConnection {
    async fn send(&self, message: &OutboundMessage) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        let frame = message.to_json()?;

        // Waiting for the sink lock counts as blocked on send too.
        let write = async move {
            let mut sink = self.inner.sink.lock().await;
            sink.send(Message::Text(frame.into())).await
        };
        tokio::select! {
            biased;
            _ = self.inner.closed.cancelled() => Err(ConnectionError::Closed),
            result = write => result.map_err(|e| self.fail(e)),
        }
    }

    async fn receive(&self) -> Result<InboundMessage, ConnectionError> {
        let mut stream = self.inner.stream.lock().await;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.inner.closed.cancelled() => return Err(ConnectionError::Closed),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(Message::Text(text))) => return Ok(InboundMessage::new(text.as_str())),
                Some(Ok(Message::Binary(bytes))) => return Ok(InboundMessage::from_binary(&bytes)),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Server closed the connection");
                    self.inner.closed.cancel();
                    return Err(ConnectionError::Closed);
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(self.fail(err)),
                None => {
                    self.inner.closed.cancel();
                    return Err(ConnectionError::Closed);
                }
            }
        }
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        self.inner.closed.cancel();

        let close_frame = async move {
            let mut sink = self.inner.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(self.inner.close_timeout, close_frame).await {
            Ok(result) => match result.map_err(map_ws_error) {
                Ok(()) | Err(ConnectionError::Closed) => Ok(()),
                Err(err) => Err(err),
            },
            Err(_) => {
                warn!(timeout = ?self.inner.close_timeout, "Close frame not sent in time");
                Err(ConnectionError::Transport(format!(
                    "close timed out after {:?}",
                    self.inner.close_timeout
                )))
            }
        }
    }
}

fn map_ws_error(err: WsError) -> ConnectionError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => ConnectionError::Closed,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => ConnectionError::Closed,
        WsError::Io(io)
            if matches!(
                io.kind(),
                ErrorKind::BrokenPipe
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::UnexpectedEof
            ) =>
        {
            ConnectionError::Closed
        }
        other => ConnectionError::Transport(other.to_string()),
    }
}
