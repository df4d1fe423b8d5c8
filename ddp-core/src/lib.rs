//! Core DDP types and codec for ddp
//!
//! This crate provides the transport-agnostic half of a Meteor DDP client:
//!
//! - **Types**: the outbound field vocabulary and frame builders, correlation
//!   ids, and a parsed view of server messages
//! - **Events**: the typed inbound event stream observers consume
//! - **Codec**: encoding of outbound frames and decoding of inbound text
//! - **Error handling**: the error type shared by the ddp crates
//! - **Observability**: `tracing` + OpenTelemetry bootstrap
//!
//! The `ddp-client` crate builds the WebSocket connection, id registry and
//! observer fan-out on top of it.
//!
//! # Example
//!
//! ```rust
//! use ddp_core::{codec, CorrelationId, OutboundMessage};
//!
//! let frame = OutboundMessage::method("addItem", vec![serde_json::json!("milk")], CorrelationId::new(1));
//! let json = codec::encode_frame(&frame).unwrap();
//! assert!(json.contains("\"id\":\"1\""));
//! ```

pub mod codec;
pub mod error;
pub mod event;
pub mod observability;
pub mod types;

pub use error::{Error, Result};
pub use event::ClientEvent;
pub use observability::{init_observability, shutdown_observability, ObservabilityConfig};
pub use types::{
    CorrelationId, DdpError, Field, InboundFrame, OutboundMessage, RequestKind, ServerMessage,
    DDP_PROTOCOL_VERSION,
};
