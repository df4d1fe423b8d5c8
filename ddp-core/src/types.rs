//! DDP wire types
//!
//! DDP frames are flat JSON objects discriminated by their `msg` field. The
//! client side only ever writes a handful of kinds (`connect`, `method`,
//! `sub`, `unsub`, and `pong` when answering heartbeats), so outbound frames
//! are modelled as a field-to-value map over a closed field vocabulary
//! ([`Field`]) rather than one struct per kind. Inbound frames get a proper
//! tagged union ([`ServerMessage`]) for consumers that want structured
//! dispatch; the client itself never requires it.
//!
//! # Correlation ids
//!
//! The client numbers its requests 1, 2, 3, ... and writes the number as a
//! JSON *string* (`"id":"1"`), which is what Meteor servers echo back in
//! `result`, `ready` and `nosub` messages. [`CorrelationId`] carries the
//! number and handles that string encoding.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Protocol version announced in the `connect` handshake
pub const DDP_PROTOCOL_VERSION: &str = "pre1";

/// Client-assigned identifier embedded in outbound requests
///
/// Serialized as a decimal string, e.g. `CorrelationId::new(3)` becomes `"3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Wrap a raw sequence number
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw sequence number
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CorrelationId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Serialize for CorrelationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CorrelationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse::<u64>()
            .map(CorrelationId)
            .map_err(|_| D::Error::custom(format!("invalid correlation id: {text:?}")))
    }
}

/// What an outstanding request was for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// A remote method call (`msg: "method"`)
    Method,
    /// A record-set subscription (`msg: "sub"`)
    Subscription,
    /// A subscription cancellation (`msg: "unsub"`)
    Unsubscription,
}

impl RequestKind {
    /// The `msg` value of frames of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Method => "method",
            RequestKind::Subscription => "sub",
            RequestKind::Unsubscription => "unsub",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field names of the DDP client vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Msg,
    Id,
    Method,
    Params,
    Name,
    ServerId,
    Session,
    Version,
    Support,
}

impl Field {
    /// The field name as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Msg => "msg",
            Field::Id => "id",
            Field::Method => "method",
            Field::Params => "params",
            Field::Name => "name",
            Field::ServerId => "server_id",
            Field::Session => "session",
            Field::Version => "version",
            Field::Support => "support",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-to-server frame
///
/// Only the fields relevant to the frame kind are present. Inserting
/// `Value::Null` removes the field instead of writing a null.
///
/// # Examples
///
/// ```rust
/// use ddp_core::{CorrelationId, Field, OutboundMessage};
///
/// let frame = OutboundMessage::method("foo", vec![], CorrelationId::new(1));
/// assert_eq!(frame.kind(), Some("method"));
/// assert_eq!(frame.get(Field::Id), Some(&serde_json::json!("1")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboundMessage {
    fields: BTreeMap<Field, Value>,
}

impl OutboundMessage {
    /// Start a frame with the given `msg` kind
    pub fn new(kind: impl Into<String>) -> Self {
        Self::default().with(Field::Msg, Value::String(kind.into()))
    }

    /// The `connect` handshake: `{msg:"connect", version:"pre1", support:["pre1"]}`
    pub fn connect() -> Self {
        Self::new("connect")
            .with(Field::Version, DDP_PROTOCOL_VERSION)
            .with(Field::Support, vec![DDP_PROTOCOL_VERSION])
    }

    /// `{msg:"method", method, params, id}`
    pub fn method(method: impl Into<String>, params: Vec<Value>, id: CorrelationId) -> Self {
        let method: String = method.into();
        Self::new(RequestKind::Method.as_str())
            .with(Field::Method, method)
            .with(Field::Params, params)
            .with(Field::Id, id.to_string())
    }

    /// `{msg:"sub", name, params, id}`
    pub fn sub(name: impl Into<String>, params: Vec<Value>, id: CorrelationId) -> Self {
        let name: String = name.into();
        Self::new(RequestKind::Subscription.as_str())
            .with(Field::Name, name)
            .with(Field::Params, params)
            .with(Field::Id, id.to_string())
    }

    /// `{msg:"unsub", id}`
    pub fn unsub(id: CorrelationId) -> Self {
        Self::new(RequestKind::Unsubscription.as_str()).with(Field::Id, id.to_string())
    }

    /// `{msg:"pong"}`, echoing the ping's id when it carried one
    pub fn pong(id: Option<String>) -> Self {
        let frame = Self::new("pong");
        match id {
            Some(id) => frame.with(Field::Id, id),
            None => frame,
        }
    }

    /// Builder-style insert
    pub fn with(mut self, field: Field, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Set a field; a null value removes it
    pub fn insert(&mut self, field: Field, value: impl Into<Value>) {
        match value.into() {
            Value::Null => {
                self.fields.remove(&field);
            }
            value => {
                self.fields.insert(field, value);
            }
        }
    }

    /// Get a field's value
    pub fn get(&self, field: Field) -> Option<&Value> {
        self.fields.get(&field)
    }

    /// The `msg` kind, if set
    pub fn kind(&self) -> Option<&str> {
        self.get(Field::Msg).and_then(Value::as_str)
    }

    /// Iterate over the present fields
    pub fn fields(&self) -> impl Iterator<Item = (Field, &Value)> {
        self.fields.iter().map(|(field, value)| (*field, value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Error payload carried by `result` and `nosub` messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdpError {
    /// Error code; Meteor sends either a number or a string
    pub error: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(
        rename = "errorType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_type: Option<String>,
}

/// Parsed view of a server-to-client frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Handshake accepted
    Connected { session: String },

    /// Handshake rejected; `version` is the version the server proposes
    Failed { version: String },

    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Subscription ended or was refused
    Nosub {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<DdpError>,
    },

    Added {
        collection: String,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Map<String, Value>>,
    },

    Changed {
        collection: String,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Map<String, Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cleared: Option<Vec<String>>,
    },

    Removed { collection: String, id: String },

    /// The listed subscriptions have sent their initial record set
    Ready { subs: Vec<String> },

    AddedBefore {
        collection: String,
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Map<String, Value>>,
        #[serde(default)]
        before: Option<String>,
    },

    MovedBefore {
        collection: String,
        id: String,
        #[serde(default)]
        before: Option<String>,
    },

    /// Outcome of a method call
    Result {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<DdpError>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },

    /// All writes of the listed methods are reflected in the data messages
    Updated { methods: Vec<String> },

    /// The server could not process a client frame
    Error {
        reason: String,
        #[serde(
            rename = "offendingMessage",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        offending_message: Option<Value>,
    },
}

impl ServerMessage {
    /// The correlation id this message answers, when it answers one
    ///
    /// Returns `None` for ids that are not client-issued sequence numbers.
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match self {
            ServerMessage::Result { id, .. } | ServerMessage::Nosub { id, .. } => {
                id.parse::<u64>().ok().map(CorrelationId::new)
            }
            _ => None,
        }
    }
}

/// Result of decoding one inbound text frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// A frame of a known `msg` kind
    Message(ServerMessage),
    /// The `{"server_id": ...}` greeting older servers send before any `msg`
    ServerId(String),
    /// Well-formed JSON this client does not know how to interpret
    Unrecognized(Value),
}
