//! Chat session: one connection, an input loop and a receive loop running
//! concurrently against it, and the shutdown that tears both down.
//!
//! Operator input reaches the connection through a bounded queue (input task
//! → send loop), so reading the console and writing the socket never block
//! each other. Closing the shared connection is the only way the loops are
//! stopped from outside; each loop notices the closed state on its own.

mod loops;
pub mod ports;

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use wschat_types::endpoint::Endpoint;
use wschat_types::error::ConnectionError;
use wschat_types::session::{LoopOutcome, Notice, SessionReport, SessionState};

use crate::compose::Composer;
use crate::connection::{Connection, Connector};

use loops::{InputEnd, input_loop, receive_loop, send_loop};
use ports::{LineSource, SessionOutput};

/// Default depth of the input → send queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Capacity of the input → send queue. Clamped to at least 1.
    pub channel_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// A connected chat session.
pub struct ChatSession<C: Connection> {
    connection: C,
    options: SessionOptions,
    state: SessionState,
}

impl<C: Connection> ChatSession<C> {
    /// Wrap an already established connection.
    pub fn new(connection: C, options: SessionOptions) -> Self {
        Self {
            connection,
            options,
            state: SessionState::Connected,
        }
    }

    /// Open a connection and print the connect notices.
    ///
    /// A failed handshake is returned as-is; there is no retry.
    pub async fn connect<K, O>(
        connector: &K,
        endpoint: &Endpoint,
        options: SessionOptions,
        output: &O,
    ) -> Result<Self, ConnectionError>
    where
        K: Connector<Connection = C>,
        O: SessionOutput,
    {
        let mut state = SessionState::Disconnected;
        advance(&mut state, SessionState::Connecting);
        output.notice(Notice::Connecting);

        match connector.connect(endpoint).await {
            Ok(connection) => {
                advance(&mut state, SessionState::Connected);
                output.notice(Notice::Connected);
                info!(endpoint = %endpoint, "Connection established");
                Ok(Self {
                    connection,
                    options,
                    state,
                })
            }
            Err(err) => {
                advance(&mut state, SessionState::Closed);
                error!(endpoint = %endpoint, error = %err, "Connection failed");
                Err(err)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Run the session until the operator interrupts it, input ends, or the
    /// connection goes away.
    ///
    /// `interrupt` resolves when the operator asks to stop (Ctrl+C). On
    /// shutdown the input task is aborted, the connection is closed exactly
    /// once, and both connection loops are joined before returning.
    pub async fn run<L, O, F>(
        mut self,
        composer: Composer,
        lines: L,
        output: O,
        interrupt: F,
    ) -> SessionReport
    where
        L: LineSource,
        O: SessionOutput,
        F: Future<Output = ()> + Send,
    {
        let capacity = self.options.channel_capacity.max(1);
        let (queue_tx, queue_rx) = mpsc::channel(capacity);

        let mut input: JoinHandle<InputEnd> =
            tokio::spawn(input_loop(composer, lines, queue_tx, output.clone()));
        let mut send: JoinHandle<(LoopOutcome, usize)> = tokio::spawn(send_loop(
            self.connection.clone(),
            queue_rx,
            output.clone(),
        ));
        let mut receive: JoinHandle<(LoopOutcome, usize)> =
            tokio::spawn(receive_loop(self.connection.clone(), output.clone()));

        let mut report = SessionReport::default();
        let mut input_end: Option<InputEnd> = None;
        let mut send_done = false;
        let mut receive_done = false;

        tokio::pin!(interrupt);

        loop {
            tokio::select! {
                _ = &mut interrupt => {
                    info!("Interrupt received");
                    report.interrupted = true;
                    break;
                }
                joined = &mut input, if input_end.is_none() => {
                    let end = joined.unwrap_or_else(|err| InputEnd::Crashed(err.to_string()));
                    report.input = end.outcome();
                    let interrupted = end == InputEnd::Interrupted;
                    // Nothing left to flush if the sender already stopped.
                    let eof_after_send = end == InputEnd::Eof && send_done;
                    input_end = Some(end);
                    if interrupted {
                        report.interrupted = true;
                        break;
                    }
                    if eof_after_send {
                        break;
                    }
                }
                joined = &mut send, if !send_done => {
                    send_done = true;
                    (report.send, report.sent) = joined_outcome(joined);
                    // After Eof the sender either drained the queue or gave up.
                    let input_over = input_end == Some(InputEnd::Eof);
                    if input_over || report.send == LoopOutcome::Closed {
                        break;
                    }
                }
                joined = &mut receive, if !receive_done => {
                    receive_done = true;
                    (report.receive, report.received) = joined_outcome(joined);
                    if report.receive == LoopOutcome::Closed {
                        break;
                    }
                }
            }

            if send_done && receive_done {
                debug!("Both connection loops stopped");
                break;
            }
        }

        if input_end.is_none() {
            input.abort();
            report.input = match input.await {
                Ok(end) => end.outcome(),
                Err(err) if err.is_cancelled() => LoopOutcome::Cancelled,
                Err(err) => InputEnd::Crashed(err.to_string()).outcome(),
            };
        }

        advance(&mut self.state, SessionState::Closing);
        output.notice(Notice::Closing);
        if let Err(err) = self.connection.close().await {
            warn!(error = %err, "Error while closing connection");
        }

        if !send_done {
            (report.send, report.sent) = joined_outcome(send.await);
        }
        if !receive_done {
            (report.receive, report.received) = joined_outcome(receive.await);
        }

        advance(&mut self.state, SessionState::Closed);
        output.notice(Notice::Done);
        info!(
            sent = report.sent,
            received = report.received,
            input = %report.input,
            send = %report.send,
            receive = %report.receive,
            "Session closed"
        );

        report
    }
}

fn advance(state: &mut SessionState, next: SessionState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal session transition {state} -> {next}"
    );
    debug!(from = %state, to = %next, "Session state change");
    *state = next;
}

fn joined_outcome(
    joined: Result<(LoopOutcome, usize), tokio::task::JoinError>,
) -> (LoopOutcome, usize) {
    match joined {
        Ok(result) => result,
        Err(err) if err.is_cancelled() => (LoopOutcome::Cancelled, 0),
        Err(err) => (LoopOutcome::Failed(format!("loop panicked: {err}")), 0),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use wschat_types::protocol::{Dialect, InboundMessage, OutboundMessage};

    use super::ports::LineEvent;
    use super::*;
    use crate::connection::memory::{MemoryConnection, pair};

    #[derive(Debug, Clone, PartialEq)]
    enum Printed {
        Notice(Notice),
        Payload(String),
    }

    #[derive(Clone, Default)]
    struct RecordingOutput {
        printed: Arc<Mutex<Vec<Printed>>>,
    }

    impl RecordingOutput {
        fn printed(&self) -> Vec<Printed> {
            self.printed.lock().unwrap().clone()
        }

        fn notices(&self) -> Vec<Notice> {
            self.printed()
                .into_iter()
                .filter_map(|p| match p {
                    Printed::Notice(n) => Some(n),
                    Printed::Payload(_) => None,
                })
                .collect()
        }

        fn payloads(&self) -> Vec<String> {
            self.printed()
                .into_iter()
                .filter_map(|p| match p {
                    Printed::Payload(text) => Some(text),
                    Printed::Notice(_) => None,
                })
                .collect()
        }
    }

    impl SessionOutput for RecordingOutput {
        fn notice(&self, notice: Notice) {
            self.printed.lock().unwrap().push(Printed::Notice(notice));
        }

        fn payload(&self, message: &InboundMessage) {
            self.printed
                .lock()
                .unwrap()
                .push(Printed::Payload(message.as_str().to_string()));
        }
    }

    /// Replays scripted events, then blocks forever like an idle operator.
    struct ScriptedLines {
        events: VecDeque<LineEvent>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedLines {
        fn new(events: Vec<LineEvent>) -> Self {
            Self {
                events: events.into(),
                prompts: Arc::default(),
            }
        }

        fn lines(lines: &[&str]) -> Self {
            Self::new(lines.iter().map(|l| LineEvent::Line(l.to_string())).collect())
        }

        fn then(mut self, event: LineEvent) -> Self {
            self.events.push_back(event);
            self
        }
    }

    impl LineSource for ScriptedLines {
        async fn next_line(&mut self, prompt: &str) -> LineEvent {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.events.pop_front() {
                Some(event) => event,
                None => std::future::pending().await,
            }
        }
    }

    struct ReadyConnector(Mutex<Option<MemoryConnection>>);

    impl Connector for ReadyConnector {
        type Connection = MemoryConnection;

        async fn connect(&self, _endpoint: &Endpoint) -> Result<MemoryConnection, ConnectionError> {
            self.0
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| ConnectionError::Handshake("connection refused".to_string()))
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not met in time");
    }

    fn session(connection: MemoryConnection) -> ChatSession<MemoryConnection> {
        ChatSession::new(connection, SessionOptions::default())
    }

    /// Spawn a session whose interrupt fires when the returned sender is used.
    fn spawn_interruptible(
        connection: MemoryConnection,
        composer: Composer,
        lines: ScriptedLines,
        output: RecordingOutput,
    ) -> (oneshot::Sender<()>, JoinHandle<SessionReport>) {
        let (interrupt_tx, interrupt_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(session(connection).run(composer, lines, output, async move {
            let _ = interrupt_rx.await;
        }));
        (interrupt_tx, handle)
    }

    fn assert_closing_then_done(output: &RecordingOutput) {
        let notices = output.notices();
        let closing = notices.iter().position(|n| *n == Notice::Closing).unwrap();
        let done = notices.iter().position(|n| *n == Notice::Done).unwrap();
        assert!(closing < done);
        assert_eq!(notices.last(), Some(&Notice::Done));
        assert_eq!(notices.iter().filter(|n| **n == Notice::Closing).count(), 1);
    }

    #[tokio::test]
    async fn init_then_bodies_are_sent_in_order() {
        let (conn, mut peer) = pair();
        let output = RecordingOutput::default();
        let lines = ScriptedLines::lines(&["alice,bob", "hello", "world"]).then(LineEvent::Eof);

        let report = session(conn)
            .run(
                Composer::new(Dialect::Paired),
                lines,
                output.clone(),
                std::future::pending(),
            )
            .await;

        assert_eq!(
            peer.drain_sent(),
            vec![
                r#"{"addressee":"alice","sender":"bob"}"#.to_string(),
                r#"{"msg":"hello"}"#.to_string(),
                r#"{"msg":"world"}"#.to_string(),
            ]
        );
        assert_eq!(report.sent, 3);
        assert_eq!(report.input, LoopOutcome::Completed);
        assert_eq!(report.send, LoopOutcome::Completed);
        assert_eq!(report.receive, LoopOutcome::Closed);
        assert!(!report.interrupted);
        assert_eq!(peer.close_calls(), 1);
        assert_closing_then_done(&output);
    }

    #[tokio::test]
    async fn prompts_follow_the_init_state() {
        let (conn, _peer) = pair();
        let lines = ScriptedLines::lines(&["alice,bob", "hi"]).then(LineEvent::Eof);
        let prompts = lines.prompts.clone();

        session(conn)
            .run(
                Composer::new(Dialect::Paired),
                lines,
                RecordingOutput::default(),
                std::future::pending(),
            )
            .await;

        assert_eq!(
            *prompts.lock().unwrap(),
            vec!["<addressee,sender>: ".to_string(), String::new(), String::new()]
        );
    }

    #[tokio::test]
    async fn missing_comma_stops_input_but_not_output() {
        let (conn, mut peer) = pair();
        let output = RecordingOutput::default();
        let (interrupt, handle) = spawn_interruptible(
            conn,
            Composer::new(Dialect::Paired),
            ScriptedLines::lines(&["alice", "ignored"]),
            output.clone(),
        );

        wait_until(|| {
            output
                .notices()
                .iter()
                .any(|n| matches!(n, Notice::InvalidInput(_)))
        })
        .await;

        assert!(peer.push("first"));
        assert!(peer.push("second"));
        wait_until(|| output.payloads().len() == 2).await;

        interrupt.send(()).unwrap();
        let report = handle.await.unwrap();

        assert_eq!(output.payloads(), vec!["first", "second"]);
        assert!(peer.drain_sent().is_empty());
        assert!(report.input.is_failure());
        assert_eq!(report.send, LoopOutcome::Completed);
        assert_eq!(report.receive, LoopOutcome::Closed);
        assert_eq!(report.received, 2);
        assert!(report.interrupted);
    }

    #[tokio::test]
    async fn every_payload_is_printed_once_in_order() {
        let (conn, peer) = pair();
        let output = RecordingOutput::default();
        for i in 0..5 {
            assert!(peer.push(format!("{{\"type\":\"msg\",\"msg\":\"m{i}\"}}")));
        }

        let (interrupt, handle) = spawn_interruptible(
            conn,
            Composer::new(Dialect::Paired),
            ScriptedLines::new(Vec::new()),
            output.clone(),
        );
        wait_until(|| output.payloads().len() == 5).await;
        interrupt.send(()).unwrap();
        let report = handle.await.unwrap();

        let expected: Vec<String> = (0..5)
            .map(|i| format!("{{\"type\":\"msg\",\"msg\":\"m{i}\"}}"))
            .collect();
        assert_eq!(output.payloads(), expected);
        assert_eq!(report.received, 5);
    }

    #[tokio::test]
    async fn interrupt_closes_exactly_once() {
        let (conn, peer) = pair();
        let output = RecordingOutput::default();

        let report = session(conn)
            .run(
                Composer::new(Dialect::Paired),
                ScriptedLines::new(Vec::new()),
                output.clone(),
                async {},
            )
            .await;

        assert!(report.interrupted);
        assert_eq!(report.input, LoopOutcome::Cancelled);
        assert_eq!(report.receive, LoopOutcome::Closed);
        assert_eq!(peer.close_calls(), 1);
        assert_closing_then_done(&output);
        assert!(output.notices().contains(&Notice::ReceiveStopped));
    }

    #[tokio::test]
    async fn readline_interrupt_shuts_the_session_down() {
        let (conn, peer) = pair();
        let output = RecordingOutput::default();

        let report = session(conn)
            .run(
                Composer::new(Dialect::Paired),
                ScriptedLines::new(vec![LineEvent::Interrupted]),
                output.clone(),
                std::future::pending(),
            )
            .await;

        assert!(report.interrupted);
        assert_eq!(peer.close_calls(), 1);
        assert_closing_then_done(&output);
    }

    #[tokio::test]
    async fn server_hang_up_ends_the_session() {
        let (conn, peer) = pair();
        let output = RecordingOutput::default();
        let handle = tokio::spawn(session(conn).run(
            Composer::new(Dialect::Paired),
            ScriptedLines::new(Vec::new()),
            output.clone(),
            std::future::pending(),
        ));

        peer.hang_up();
        let report = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("session did not stop after hang up")
            .unwrap();

        assert!(!report.interrupted);
        assert_eq!(report.receive, LoopOutcome::Closed);
        assert_eq!(report.input, LoopOutcome::Cancelled);
        assert_eq!(peer.close_calls(), 1);
        assert_closing_then_done(&output);
    }

    #[tokio::test]
    async fn send_failure_stays_inside_the_send_loop() {
        let (conn, peer) = pair();
        let output = RecordingOutput::default();
        peer.fail_sends_with(ConnectionError::Transport("broken pipe".to_string()));

        let (interrupt, handle) = spawn_interruptible(
            conn,
            Composer::new(Dialect::Paired),
            ScriptedLines::lines(&["alice,bob"]),
            output.clone(),
        );

        wait_until(|| peer.send_attempts() == 1).await;
        assert!(peer.push("still listening"));
        wait_until(|| output.payloads().len() == 1).await;

        interrupt.send(()).unwrap();
        let report = handle.await.unwrap();

        assert_eq!(
            report.send,
            LoopOutcome::Failed("transport error: broken pipe".to_string())
        );
        assert_eq!(report.sent, 0);
        assert_eq!(report.receive, LoopOutcome::Closed);
        assert_eq!(peer.close_calls(), 1);
    }

    #[tokio::test]
    async fn session_ends_once_both_connection_loops_fail() {
        let (conn, peer) = pair();
        peer.fail_receives_with(ConnectionError::Transport("reset by peer".to_string()));
        let output = RecordingOutput::default();

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            session(conn).run(
                Composer::new(Dialect::Paired),
                ScriptedLines::lines(&["alice"]),
                output.clone(),
                std::future::pending(),
            ),
        )
        .await
        .expect("session kept running after every loop stopped");

        assert!(report.input.is_failure());
        assert_eq!(report.send, LoopOutcome::Completed);
        assert_eq!(
            report.receive,
            LoopOutcome::Failed("transport error: reset by peer".to_string())
        );
        assert!(!report.interrupted);
        assert_eq!(peer.close_calls(), 1);
        assert_closing_then_done(&output);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn eof_shuts_down_even_when_the_send_fails() {
        for _ in 0..20 {
            let (conn, peer) = pair();
            peer.fail_sends_with(ConnectionError::Transport("broken pipe".to_string()));
            let output = RecordingOutput::default();
            let lines = ScriptedLines::lines(&["a,b"]).then(LineEvent::Eof);

            let report = tokio::time::timeout(
                Duration::from_secs(5),
                session(conn).run(
                    Composer::new(Dialect::Paired),
                    lines,
                    output.clone(),
                    std::future::pending(),
                ),
            )
            .await
            .expect("session kept running after end of input");

            assert_eq!(report.input, LoopOutcome::Completed);
            assert_eq!(
                report.send,
                LoopOutcome::Failed("transport error: broken pipe".to_string())
            );
            assert!(!report.interrupted);
            assert_eq!(peer.close_calls(), 1);
            assert_closing_then_done(&output);
        }
    }

    #[tokio::test]
    async fn tagged_opening_goes_out_before_any_input() {
        let (conn, mut peer) = pair();
        let lines = ScriptedLines::lines(&["hi"]).then(LineEvent::Eof);

        session(conn)
            .run(
                Composer::new(Dialect::Tagged).with_addressee("carol"),
                lines,
                RecordingOutput::default(),
                std::future::pending(),
            )
            .await;

        let first = peer.next_sent().await.unwrap();
        let second = peer.next_sent().await.unwrap();
        assert_eq!(
            OutboundMessage::from_json(&first).unwrap(),
            OutboundMessage::init_chat("carol")
        );
        assert_eq!(
            OutboundMessage::from_json(&second).unwrap(),
            OutboundMessage::tagged_body("hi")
        );
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped() {
        let (conn, mut peer) = pair();
        let options = SessionOptions {
            channel_capacity: 0,
        };
        let lines = ScriptedLines::lines(&["a,b", "x"]).then(LineEvent::Eof);

        let report = ChatSession::new(conn, options)
            .run(
                Composer::new(Dialect::Paired),
                lines,
                RecordingOutput::default(),
                std::future::pending(),
            )
            .await;

        assert_eq!(report.sent, 2);
        assert_eq!(peer.drain_sent().len(), 2);
    }

    #[tokio::test]
    async fn connect_prints_notices_and_enters_connected() {
        let (conn, _peer) = pair();
        let connector = ReadyConnector(Mutex::new(Some(conn)));
        let endpoint = Endpoint::parse("ws://localhost:3000/messages").unwrap();
        let output = RecordingOutput::default();

        let session =
            ChatSession::connect(&connector, &endpoint, SessionOptions::default(), &output)
                .await
                .unwrap();

        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(output.notices(), vec![Notice::Connecting, Notice::Connected]);
    }

    #[tokio::test]
    async fn connect_failure_is_returned_without_retry() {
        let connector = ReadyConnector(Mutex::new(None));
        let endpoint = Endpoint::parse("ws://localhost:3000/messages").unwrap();
        let output = RecordingOutput::default();

        let result =
            ChatSession::connect(&connector, &endpoint, SessionOptions::default(), &output).await;

        assert!(matches!(result, Err(ConnectionError::Handshake(_))));
        assert_eq!(output.notices(), vec![Notice::Connecting]);
    }
}
