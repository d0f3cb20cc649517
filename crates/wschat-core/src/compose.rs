//! Turns operator input lines into outbound messages for one dialect.
//!
//! Fields are taken verbatim: no trimming, no unescaping. A line that does
//! not carry the fields the dialect needs is rejected with an
//! [`InputFormatError`] instead of being sent.

use wschat_types::error::InputFormatError;
use wschat_types::protocol::{Dialect, OutboundMessage};

/// Per-session message builder.
///
/// Dialects with a session init (`paired`, `tagged`) consume the first line
/// as routing input and emit the init message exactly once; every later line
/// becomes a body.
#[derive(Debug, Clone)]
pub struct Composer {
    dialect: Dialect,
    addressee: Option<String>,
    awaiting_init: bool,
}

impl Composer {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            addressee: None,
            awaiting_init: matches!(dialect, Dialect::Paired | Dialect::Tagged),
        }
    }

    /// Preset the addressee so the `tagged` init needs no input line.
    pub fn with_addressee(mut self, addressee: impl Into<String>) -> Self {
        self.addressee = Some(addressee.into());
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Whether the next line is still routing input.
    pub fn awaiting_init(&self) -> bool {
        self.awaiting_init
    }

    /// Prompt for the next line.
    pub fn prompt(&self) -> &'static str {
        match self.dialect {
            Dialect::Relay => self.dialect.init_prompt(),
            Dialect::Paired | Dialect::Tagged if self.awaiting_init => self.dialect.init_prompt(),
            _ => "",
        }
    }

    /// Init message that can be sent before any input is read.
    ///
    /// Only the `tagged` dialect with a preset addressee has one. Returns it
    /// at most once.
    pub fn opening(&mut self) -> Option<OutboundMessage> {
        if self.dialect != Dialect::Tagged || !self.awaiting_init {
            return None;
        }
        let addressee = self.addressee.clone()?;
        self.awaiting_init = false;
        Some(OutboundMessage::init_chat(addressee))
    }

    /// Build the message for one line of operator input.
    pub fn compose(&mut self, line: &str) -> Result<OutboundMessage, InputFormatError> {
        match self.dialect {
            Dialect::Paired if self.awaiting_init => {
                // Fields past the second are ignored.
                let fields: Vec<&str> = line.split(',').collect();
                let [addressee, sender, ..] = fields.as_slice() else {
                    return Err(InputFormatError::FieldCount {
                        expected: 2,
                        found: fields.len(),
                    });
                };
                let message = OutboundMessage::Init {
                    addressee: addressee.to_string(),
                    sender: sender.to_string(),
                };
                self.awaiting_init = false;
                Ok(message)
            }
            Dialect::Paired => Ok(OutboundMessage::body(line)),
            Dialect::Relay => {
                // The message text keeps any further commas.
                let fields: Vec<&str> = line.splitn(3, ',').collect();
                let [addressee, sender, msg] = fields.as_slice() else {
                    return Err(InputFormatError::FieldCount {
                        expected: 3,
                        found: fields.len(),
                    });
                };
                Ok(OutboundMessage::Relay {
                    addressee: addressee.to_string(),
                    sender: sender.to_string(),
                    msg: msg.to_string(),
                })
            }
            Dialect::Addressed => Ok(OutboundMessage::tagged_body(line)),
            Dialect::Tagged if self.awaiting_init => {
                if line.trim().is_empty() {
                    return Err(InputFormatError::EmptyAddressee);
                }
                self.awaiting_init = false;
                Ok(OutboundMessage::init_chat(line))
            }
            Dialect::Tagged => Ok(OutboundMessage::tagged_body(line)),
        }
    }
}
