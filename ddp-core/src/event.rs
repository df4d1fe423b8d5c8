//! Client-visible events
//!
//! Everything a DDP client learns after it has been constructed arrives as a
//! [`ClientEvent`]: transport lifecycle changes and raw server frames share one
//! ordered stream, so a consumer sees a close *after* the last frame that
//! preceded it.
//!
//! Older consumers worked with a single untyped text channel in which
//! lifecycle notices were rendered as synthetic strings. [`ClientEvent::legacy_text`]
//! reproduces those strings exactly, so text-only observers keep working:
//!
//! | event | legacy text |
//! |---|---|
//! | `RawMessage { text }` | `text`, unchanged |
//! | `TransportError { detail }` | `WebSocketClient error: <detail>` |
//! | `Closed { code, reason, remote }` | `WebSocketClient connection closed:<code>, <reason>, <remote>` |
//! | `Opened` | none |

use crate::codec;
use crate::error::Result;
use crate::types::InboundFrame;
use std::fmt;

/// Prefix of the legacy text rendering of a transport error
pub const TRANSPORT_ERROR_PREFIX: &str = "WebSocketClient error: ";

/// Prefix of the legacy text rendering of a connection close
pub const CONNECTION_CLOSED_PREFIX: &str = "WebSocketClient connection closed:";

/// An inbound event delivered to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The transport opened and the handshake frame was written
    Opened,

    /// The transport closed; the connection will produce no further events
    Closed {
        /// WebSocket close code (1006 when the connection dropped without one)
        code: u16,
        reason: String,
        /// `true` when the server initiated the close
        remote: bool,
    },

    /// The transport reported an error; a `Closed` event may or may not follow
    TransportError { detail: String },

    /// A text frame from the server, unparsed
    RawMessage { text: String },
}

impl ClientEvent {
    pub fn raw(text: impl Into<String>) -> Self {
        ClientEvent::RawMessage { text: text.into() }
    }

    pub fn transport_error(detail: impl fmt::Display) -> Self {
        ClientEvent::TransportError {
            detail: detail.to_string(),
        }
    }

    pub fn closed(code: u16, reason: impl Into<String>, remote: bool) -> Self {
        ClientEvent::Closed {
            code,
            reason: reason.into(),
            remote,
        }
    }

    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::Opened => "opened",
            ClientEvent::Closed { .. } => "closed",
            ClientEvent::TransportError { .. } => "transport_error",
            ClientEvent::RawMessage { .. } => "raw_message",
        }
    }

    /// `true` for everything except server data
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, ClientEvent::RawMessage { .. })
    }

    /// The text an untyped observer receives for this event
    pub fn legacy_text(&self) -> Option<String> {
        match self {
            ClientEvent::Opened => None,
            ClientEvent::Closed {
                code,
                reason,
                remote,
            } => Some(format!(
                "{}{}, {}, {}",
                CONNECTION_CLOSED_PREFIX, code, reason, remote
            )),
            ClientEvent::TransportError { detail } => {
                Some(format!("{}{}", TRANSPORT_ERROR_PREFIX, detail))
            }
            ClientEvent::RawMessage { text } => Some(text.clone()),
        }
    }

    /// Decode a `RawMessage` into the parsed view
    ///
    /// Returns `None` for lifecycle events.
    pub fn parse(&self) -> Option<Result<InboundFrame>> {
        match self {
            ClientEvent::RawMessage { text } => Some(codec::decode(text)),
            _ => None,
        }
    }
}
