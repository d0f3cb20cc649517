//! Console output for the chat session.
//!
//! Status notices are styled; received payloads are printed verbatim.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use console::style;
use rustyline_async::SharedWriter;

use wschat_core::session::ports::SessionOutput;
use wschat_types::protocol::InboundMessage;
use wschat_types::session::Notice;

/// Where the session prints.
#[derive(Clone)]
pub enum ConsoleOutput {
    /// Through the readline, so output does not clobber the prompt. `live`
    /// turns false once the readline is gone.
    Shared {
        writer: SharedWriter,
        live: Arc<AtomicBool>,
    },
    Stdout,
}

impl ConsoleOutput {
    pub fn shared(writer: SharedWriter, live: Arc<AtomicBool>) -> Self {
        Self::Shared { writer, live }
    }

    fn write_line(&self, line: &str) {
        if let ConsoleOutput::Shared { writer, live } = self {
            if live.load(Ordering::SeqCst) {
                let mut writer = writer.clone();
                if writeln!(writer, "{line}").is_ok() {
                    return;
                }
            }
        }

        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }
}

impl SessionOutput for ConsoleOutput {
    fn notice(&self, notice: Notice) {
        self.write_line(&render_notice(&notice));
    }

    fn payload(&self, message: &InboundMessage) {
        self.write_line(message.as_str());
    }
}

/// Styled text for a status notice.
pub fn render_notice(notice: &Notice) -> String {
    let text = notice.to_string();
    match notice {
        Notice::Connecting | Notice::Closing => format!("{}", style(text).dim()),
        Notice::Connected | Notice::Done => format!("{}", style(text).green()),
        Notice::SendStopped | Notice::ReceiveStopped => format!("{}", style(text).yellow()),
        Notice::InvalidInput(_) => format!("{}", style(text).red().bold()),
    }
}
