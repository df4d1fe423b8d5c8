//! Meteor DDP client over WebSocket
//!
//! This crate speaks the client side of DDP (protocol version `pre1`): it
//! opens the WebSocket, sends the `connect` handshake, issues method calls
//! and subscriptions under a single correlation id sequence, and hands every
//! inbound frame to registered observers.
//!
//! # Core Features
//!
//! - **Correlation ids**: `call`/`subscribe`/`unsubscribe` share one gap-free
//!   sequence starting at 1, safe under concurrent callers
//! - **Ordered outbound frames**: the handshake always goes first; frames
//!   issued before the socket opens are queued behind it
//! - **Observers**: typed [`ddp_core::ClientEvent`]s, the legacy text stream,
//!   or decoded [`ddp_core::InboundFrame`]s
//! - **Reconnection**: optional, layered on top in [`ReconnectingClient`]
//! - **Observability**: OpenTelemetry traces and metrics when enabled
//!
//! Responses are not matched to requests; observers receive the raw frames
//! and correlate them by the echoed id.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ddp_client::DdpClient;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DdpClient::new("localhost", Some(3000))?;
//!
//!     client
//!         .add_text_observer(|text| async move {
//!             println!("Received response: {}", text);
//!         })
//!         .await;
//!
//!     client.connect().await?;
//!     let id = client.call("addItem", vec![json!("milk")]).await?;
//!     println!("Sent call {}", id);
//!     Ok(())
//! }
//! ```

mod client;
mod client_builder;
mod connection;
mod metrics;
mod observer;
mod reconnect;
mod registry;
mod supervisor;

pub use client::DdpClient;
pub use client_builder::{ClientBuilder, ServerAddress, DEFAULT_PATH, DEFAULT_PORT};
pub use connection::{
    ConnectionManager, ConnectionOptions, ConnectionState, CLOSE_ABNORMAL, CLOSE_NORMAL,
    CLOSE_NO_STATUS,
};
pub use metrics::ClientMetrics;
pub use observer::{ObserverFn, ObserverHub, ObserverId};
pub use reconnect::{ExponentialBackoff, FixedDelay, NoReconnect, ReconnectionStrategy};
pub use registry::{IdentifierRegistry, PendingRequest};
pub use supervisor::ReconnectingClient;
