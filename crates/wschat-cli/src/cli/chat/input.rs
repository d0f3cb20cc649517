//! Operator input for the chat session.
//!
//! On a terminal, wraps `rustyline_async::Readline` so received payloads can
//! be printed above the prompt while the operator types. When stdin is not a
//! terminal, lines come from a blocking reader thread instead.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustyline_async::{Readline, ReadlineError, ReadlineEvent};
use tokio::sync::mpsc;
use tracing::warn;

use wschat_core::session::ports::{LineEvent, LineSource};

use super::output::ConsoleOutput;

/// Readline-backed input for an interactive terminal.
pub struct ChatInput {
    rl: Readline,
    prompt: String,
    live: Arc<AtomicBool>,
}

impl ChatInput {
    /// Put the terminal into readline mode.
    ///
    /// Returns the input handler and a [`ConsoleOutput`] that prints through
    /// the readline while it is alive and falls back to plain stdout after.
    pub fn new() -> Result<(Self, ConsoleOutput), ReadlineError> {
        let (rl, writer) = Readline::new(String::new())?;
        let live = Arc::new(AtomicBool::new(true));
        let output = ConsoleOutput::shared(writer, live.clone());
        Ok((
            Self {
                rl,
                prompt: String::new(),
                live,
            },
            output,
        ))
    }
}

impl LineSource for ChatInput {
    async fn next_line(&mut self, prompt: &str) -> LineEvent {
        if prompt != self.prompt {
            let _ = self.rl.update_prompt(prompt);
            self.prompt = prompt.to_string();
        }

        match self.rl.readline().await {
            Ok(ReadlineEvent::Line(line)) => LineEvent::Line(line),
            Ok(ReadlineEvent::Eof) => LineEvent::Eof,
            Ok(ReadlineEvent::Interrupted) => LineEvent::Interrupted,
            Err(err) => {
                warn!(error = %err, "Readline failed, treating as end of input");
                LineEvent::Eof
            }
        }
    }
}

impl Drop for ChatInput {
    fn drop(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        // Print anything still queued in the shared writer.
        let _ = self.rl.flush();
    }
}

/// Line-by-line stdin for pipes and redirected input. Prompts are not shown.
///
/// Lines are read on a detached thread so a pending read never holds up
/// process exit.
pub struct StdinLines {
    lines: mpsc::Receiver<std::io::Result<String>>,
}

impl StdinLines {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(16);
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
        Self { lines: rx }
    }
}

impl LineSource for StdinLines {
    async fn next_line(&mut self, _prompt: &str) -> LineEvent {
        match self.lines.recv().await {
            Some(Ok(line)) => LineEvent::Line(line),
            None => LineEvent::Eof,
            Some(Err(err)) => {
                warn!(error = %err, "Failed to read stdin, treating as end of input");
                LineEvent::Eof
            }
        }
    }
}
