//! Meteor DDP client
//!
//! Convenience crate re-exporting the ddp sub-crates.
//!
//! # Architecture
//!
//! - **ddp-core**: wire types, codec, events, errors, observability bootstrap
//! - **ddp-client**: WebSocket connection, correlation ids, observers,
//!   reconnection
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ddp::DdpClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = DdpClient::new("localhost", None)?;
//!
//!     client
//!         .add_text_observer(|text| async move {
//!             println!("Received response: {}", text);
//!         })
//!         .await;
//!
//!     client.connect().await?;
//!     client.subscribe("allPositions", vec![]).await?;
//!     Ok(())
//! }
//! ```

pub use ddp_client as client;
pub use ddp_core as core;

pub use ddp_client::{ClientBuilder, DdpClient, ReconnectingClient};
pub use ddp_core::{ClientEvent, Error, InboundFrame, OutboundMessage, Result, ServerMessage};
