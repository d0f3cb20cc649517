//! Wire protocol for the chat endpoint.
//!
//! Every outbound frame is a flat JSON object. The server family this client
//! talks to has used several shapes over time; [`OutboundMessage`] names all of
//! them, and a [`Dialect`] picks the subset a single session speaks.
//!
//! Inbound frames are opaque: [`InboundMessage`] carries the payload text and
//! nothing else.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// Messages carrying an explicit `"type"` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum TaggedMessage {
    /// Opens a conversation with a user by nickname.
    InitChat { addressee_nickname: String },
    /// Chat body.
    Msg { msg: String },
}

/// Every outbound shape the client can put on the wire.
///
/// Serialized untagged, so each variant encodes to exactly the flat object
/// shown on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    /// `{"type": "init_chat", ...}` or `{"type": "msg", ...}`
    Tagged(TaggedMessage),
    /// `{"addressee": .., "sender": .., "msg": ..}` -- routing on every message.
    Relay {
        addressee: String,
        sender: String,
        msg: String,
    },
    /// `{"addressee": .., "sender": ..}` -- session init.
    Init { addressee: String, sender: String },
    /// `{"msg": ..}` -- chat body.
    Body { msg: String },
}

impl OutboundMessage {
    pub fn body(msg: impl Into<String>) -> Self {
        OutboundMessage::Body { msg: msg.into() }
    }

    pub fn tagged_body(msg: impl Into<String>) -> Self {
        OutboundMessage::Tagged(TaggedMessage::Msg { msg: msg.into() })
    }

    pub fn init_chat(addressee_nickname: impl Into<String>) -> Self {
        OutboundMessage::Tagged(TaggedMessage::InitChat {
            addressee_nickname: addressee_nickname.into(),
        })
    }

    /// Whether this message opens a session rather than carrying chat text.
    pub fn is_init(&self) -> bool {
        matches!(
            self,
            OutboundMessage::Init { .. }
                | OutboundMessage::Tagged(TaggedMessage::InitChat { .. })
        )
    }

    /// Encode as a single JSON text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode any recognized outbound shape.
    ///
    /// Objects with a `"type"` key must be a valid [`TaggedMessage`]; untagged
    /// objects must carry exactly the string fields of one shape.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(map) = value else {
            return Err(ProtocolError::UnrecognizedShape(text.to_string()));
        };

        if map.contains_key("type") {
            let tagged: TaggedMessage = serde_json::from_value(Value::Object(map))?;
            return Ok(OutboundMessage::Tagged(tagged));
        }

        let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
        keys.sort_unstable();

        let unrecognized = || ProtocolError::UnrecognizedShape(text.to_string());
        let field = |name: &str| -> Result<String, ProtocolError> {
            match map.get(name) {
                Some(Value::String(s)) => Ok(s.clone()),
                _ => Err(unrecognized()),
            }
        };

        match keys.as_slice() {
            ["addressee", "msg", "sender"] => Ok(OutboundMessage::Relay {
                addressee: field("addressee")?,
                sender: field("sender")?,
                msg: field("msg")?,
            }),
            ["addressee", "sender"] => Ok(OutboundMessage::Init {
                addressee: field("addressee")?,
                sender: field("sender")?,
            }),
            ["msg"] => Ok(OutboundMessage::Body { msg: field("msg")? }),
            _ => Err(unrecognized()),
        }
    }
}

/// A payload received from the server. Printed verbatim, never parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage(String);

impl InboundMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Binary frames are shown as text; invalid UTF-8 is replaced.
    pub fn from_binary(bytes: &[u8]) -> Self {
        Self(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The wire schema spoken for the whole of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `addressee,sender` once, then `{"msg"}` bodies.
    #[default]
    Paired,
    /// `addressee,sender,msg` on every line.
    Relay,
    /// Addressee in the URL query, `{"type":"msg"}` bodies.
    Addressed,
    /// Bearer token, `init_chat`, then `{"type":"msg"}` bodies.
    Tagged,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::Paired,
        Dialect::Relay,
        Dialect::Addressed,
        Dialect::Tagged,
    ];

    /// Prompt shown while the session still needs routing input from the
    /// operator.
    pub fn init_prompt(&self) -> &'static str {
        match self {
            Dialect::Paired => "<addressee,sender>: ",
            Dialect::Relay => "<addressee, sender, msg>: ",
            Dialect::Addressed | Dialect::Tagged => "<addressee>: ",
        }
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            Dialect::Paired | Dialect::Relay => "ws://localhost:3000/messages",
            Dialect::Addressed | Dialect::Tagged => "ws://localhost:3000/chat",
        }
    }

    /// Whether the server rejects the upgrade without a bearer token.
    pub fn requires_token(&self) -> bool {
        matches!(self, Dialect::Tagged)
    }

    /// Whether the addressee travels as `?addressee_nickname=` on the URL.
    pub fn addressee_in_url(&self) -> bool {
        matches!(self, Dialect::Addressed)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Paired => write!(f, "paired"),
            Dialect::Relay => write!(f, "relay"),
            Dialect::Addressed => write!(f, "addressed"),
            Dialect::Tagged => write!(f, "tagged"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paired" => Ok(Dialect::Paired),
            "relay" => Ok(Dialect::Relay),
            "addressed" => Ok(Dialect::Addressed),
            "tagged" => Ok(Dialect::Tagged),
            other => Err(format!("invalid dialect: '{other}'")),
        }
    }
}
