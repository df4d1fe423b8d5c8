//! Codec for DDP frames
//!
//! Outbound frames are serialized straight from [`OutboundMessage`]. Inbound
//! text is decoded into an [`InboundFrame`] in two steps: first into a generic
//! JSON value, then into a [`ServerMessage`] based on its `msg` field. The
//! two-step approach lets the decoder tell apart the three cases a client
//! actually meets:
//!
//! - a frame of a known kind, returned as [`InboundFrame::Message`]
//! - the legacy `{"server_id": "0"}` greeting, which has no `msg` field
//! - well-formed JSON of a kind this client does not know, returned as
//!   [`InboundFrame::Unrecognized`] rather than as an error
//!
//! Invalid JSON, non-object frames, and known kinds with missing fields are
//! errors.
//!
//! # Examples
//!
//! ```rust
//! use ddp_core::{codec, InboundFrame, OutboundMessage, ServerMessage};
//!
//! let text = codec::encode(&OutboundMessage::connect()).unwrap();
//! assert!(text.contains("\"msg\":\"connect\""));
//!
//! let frame = codec::decode(r#"{"msg":"ready","subs":["2"]}"#).unwrap();
//! assert_eq!(
//!     frame,
//!     InboundFrame::Message(ServerMessage::Ready { subs: vec!["2".into()] })
//! );
//! ```

use crate::error::{Error, Result};
use crate::types::{InboundFrame, OutboundMessage, ServerMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `msg` kinds decoded into [`ServerMessage`]
pub const SERVER_MESSAGE_KINDS: &[&str] = &[
    "connected",
    "failed",
    "ping",
    "pong",
    "nosub",
    "added",
    "changed",
    "removed",
    "ready",
    "addedBefore",
    "movedBefore",
    "result",
    "updated",
    "error",
];

/// Encode any serializable message to a JSON string
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode an outbound frame
pub fn encode_frame(frame: &OutboundMessage) -> Result<String> {
    encode(frame)
}

/// Decode one inbound text frame
pub fn decode(data: &str) -> Result<InboundFrame> {
    let value: Value = serde_json::from_str(data).map_err(|e| Error::Parse(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| Error::Parse("frame is not a JSON object".to_string()))?;

    match object.get("msg").and_then(Value::as_str) {
        Some(kind) if SERVER_MESSAGE_KINDS.contains(&kind) => {
            let kind = kind.to_string();
            serde_json::from_value::<ServerMessage>(value)
                .map(InboundFrame::Message)
                .map_err(|e| Error::Parse(format!("malformed {} message: {}", kind, e)))
        }
        Some(_) => Ok(InboundFrame::Unrecognized(value)),
        None => match object.get("server_id").and_then(Value::as_str) {
            Some(server_id) => Ok(InboundFrame::ServerId(server_id.to_string())),
            None => Ok(InboundFrame::Unrecognized(value)),
        },
    }
}

/// Decode a JSON string to a specific type
pub fn decode_as<'de, T: Deserialize<'de>>(data: &'de str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CorrelationId;
    use serde_json::json;

    #[test]
    fn test_encode_frame() {
        let frame = OutboundMessage::sub("items", vec![], CorrelationId::new(2));
        let text = encode_frame(&frame).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"msg": "sub", "name": "items", "params": [], "id": "2"})
        );
    }

    #[test]
    fn test_decode_known_kind() {
        let frame = decode(r#"{"msg":"added","collection":"items","id":"x","fields":{"n":1}}"#)
            .unwrap();
        match frame {
            InboundFrame::Message(ServerMessage::Added {
                collection,
                id,
                fields,
            }) => {
                assert_eq!(collection, "items");
                assert_eq!(id, "x");
                assert_eq!(fields.unwrap().get("n"), Some(&json!(1)));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_decode_server_id_greeting() {
        assert_eq!(
            decode(r#"{"server_id":"0"}"#).unwrap(),
            InboundFrame::ServerId("0".into())
        );
    }

    #[test]
    fn test_decode_unknown_kind() {
        let frame = decode(r#"{"msg":"shiny","x":1}"#).unwrap();
        assert_eq!(frame, InboundFrame::Unrecognized(json!({"msg": "shiny", "x": 1})));
    }

    #[test]
    fn test_decode_malformed_known_kind() {
        // `connected` requires a session
        let err = decode(r#"{"msg":"connected"}"#).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_decode_invalid_json() {
        assert!(matches!(decode("{not json"), Err(Error::Parse(_))));
        assert!(matches!(decode("[1,2]"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_decode_as() {
        let frame: OutboundMessage = decode_as(r#"{"msg":"unsub","id":"3"}"#).unwrap();
        assert_eq!(frame, OutboundMessage::unsub(CorrelationId::new(3)));
    }
}
