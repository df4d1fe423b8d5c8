//! Subscription example
//!
//! Connects, waits a moment, then subscribes to `allPositions` and prints the
//! decoded record updates. Pass `--reconnect` to keep reconnecting with
//! exponential backoff when the server goes away.
//!
//! Run with: cargo run --example subscribe_client -- [host] [port] [--reconnect]

use ddp::client::{ClientBuilder, ExponentialBackoff, NoReconnect};
use ddp::core::{InboundFrame, ServerMessage};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let reconnect = std::env::args().any(|arg| arg == "--reconnect");
    let mut args = std::env::args().skip(1).filter(|arg| !arg.starts_with("--"));
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port = args.next().map(|p| p.parse::<u16>()).transpose()?;

    let mut builder = ClientBuilder::new(host).auto_pong(true);
    if let Some(port) = port {
        builder = builder.port(port);
    }
    if reconnect {
        builder = builder.with_reconnect(Box::new(
            ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(10))
                .with_jitter(),
        ));
    } else {
        builder = builder.with_reconnect(Box::new(NoReconnect));
    }
    let client = builder.build_reconnecting()?;

    client
        .add_message_observer(|frame| async move {
            match frame {
                InboundFrame::Message(ServerMessage::Added { collection, id, fields }) => {
                    println!("+ {}/{} {:?}", collection, id, fields);
                }
                InboundFrame::Message(ServerMessage::Changed { collection, id, fields, .. }) => {
                    println!("~ {}/{} {:?}", collection, id, fields);
                }
                InboundFrame::Message(ServerMessage::Removed { collection, id }) => {
                    println!("- {}/{}", collection, id);
                }
                InboundFrame::Message(ServerMessage::Ready { subs }) => {
                    println!("ready: {:?}", subs);
                }
                InboundFrame::Message(ServerMessage::Nosub { id, error }) => {
                    println!("nosub {}: {:?}", id, error);
                }
                other => println!("Received response: {:?}", other),
            }
        })
        .await;

    client.connect().await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let id = client.subscribe("allPositions", vec![]).await?;
    println!("Subscribed as {}", id);

    tokio::signal::ctrl_c().await?;

    client.unsubscribe_id(id).await?;
    client.disconnect().await?;
    Ok(())
}
