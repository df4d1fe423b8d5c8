//! Simple client example
//!
//! Connects to a Meteor server and prints everything it sends back.
//!
//! Run with: cargo run --example simple_client -- [host] [port]

use ddp::DdpClient;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port = args.next().map(|p| p.parse::<u16>()).transpose()?;

    let client = DdpClient::new(host, port)?;

    client
        .add_text_observer(|text| async move {
            println!("Received response: {}", text);
        })
        .await;

    println!("Connecting to {}", client.address());
    client.connect().await?;

    tokio::time::sleep(Duration::from_secs(5)).await;

    client.disconnect().await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    Ok(())
}
