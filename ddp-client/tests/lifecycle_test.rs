//! Connection lifecycle integration tests
//!
//! Disconnected -> Connecting -> Connected -> Closed, with Closed terminal.

mod common;

use common::{handshake, refused_port, wait_until, MockDdpServer};
use ddp_client::{ConnectionState, DdpClient, CLOSE_ABNORMAL, CLOSE_NORMAL};
use ddp_core::{ClientEvent, Error};
use std::time::Duration;
use tokio::sync::mpsc;

async fn event_channel(client: &DdpClient) -> mpsc::UnboundedReceiver<ClientEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    client
        .add_observer(move |event| {
            let _ = tx.send(event);
            std::future::ready(())
        })
        .await;
    rx
}

async fn next(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("observer channel closed")
}

#[tokio::test]
async fn test_invalid_address_fails_construction() {
    assert!(matches!(
        DdpClient::new("not a host", None),
        Err(Error::InvalidAddress(_))
    ));
    assert!(matches!(DdpClient::new("", Some(80)), Err(Error::InvalidAddress(_))));
}

#[tokio::test]
async fn test_default_port_is_3000() {
    let client = DdpClient::new("localhost", None).unwrap();
    assert_eq!(client.address().url(), "ws://localhost:3000/websocket");
    assert_eq!(client.state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_second_connect_is_an_error() {
    let mut server = MockDdpServer::new().await;
    let client = DdpClient::new("127.0.0.1", Some(server.port())).unwrap();

    client.connect().await.unwrap();
    assert!(matches!(client.connect().await, Err(Error::InvalidState(_))));

    assert_eq!(server.wait_for_json().await, handshake());
    assert!(!server.has_more(Duration::from_millis(100)).await);
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn test_refused_connection_reports_error_then_close() {
    let client = DdpClient::new("127.0.0.1", Some(refused_port().await)).unwrap();
    let mut rx = event_channel(&client).await;

    client.connect().await.unwrap();

    let error = next(&mut rx).await;
    assert!(matches!(error, ClientEvent::TransportError { .. }));
    assert!(error
        .legacy_text()
        .unwrap()
        .starts_with("WebSocketClient error: "));

    match next(&mut rx).await {
        ClientEvent::Closed { code, remote, .. } => {
            assert_eq!(code, CLOSE_ABNORMAL);
            assert!(!remote);
        }
        other => panic!("expected close, got {:?}", other),
    }
    assert_eq!(client.state().await, ConnectionState::Closed);
    assert_eq!(client.call("late", vec![]).await, Err(Error::ConnectionClosed));
}

#[tokio::test]
async fn test_calls_from_error_observer_are_refused() {
    let client = DdpClient::new("127.0.0.1", Some(refused_port().await)).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let retrying = client.clone();
    client
        .add_observer(move |event| {
            let client = retrying.clone();
            let tx = tx.clone();
            async move {
                if matches!(event, ClientEvent::TransportError { .. }) {
                    let _ = tx.send(client.call("retry", vec![]).await);
                }
            }
        })
        .await;

    client.connect().await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, Err(Error::ConnectionClosed));
    assert!(client.pending_requests().await.is_empty());
}

#[tokio::test]
async fn test_local_disconnect() {
    let mut server = MockDdpServer::new().await;
    let client = DdpClient::new("127.0.0.1", Some(server.port())).unwrap();
    let mut rx = event_channel(&client).await;

    client.connect().await.unwrap();
    assert_eq!(next(&mut rx).await, ClientEvent::Opened);
    server.wait_for_frame().await.unwrap();

    client.disconnect().await.unwrap();
    assert_eq!(
        next(&mut rx).await,
        ClientEvent::closed(CLOSE_NORMAL, "", false)
    );
    assert_eq!(client.state().await, ConnectionState::Closed);

    // Terminal
    assert!(matches!(client.connect().await, Err(Error::InvalidState(_))));
    client.disconnect().await.unwrap();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_frames_sent_before_disconnect_are_delivered() {
    let mut server = MockDdpServer::new().await;
    let client = DdpClient::new("127.0.0.1", Some(server.port())).unwrap();

    client.connect().await.unwrap();
    client.call("last", vec![]).await.unwrap();
    client.disconnect().await.unwrap();

    assert_eq!(server.wait_for_json().await, handshake());
    assert_eq!(server.wait_for_json().await["method"], "last");

    let watched = client.clone();
    wait_until(|| {
        let client = watched.clone();
        async move { client.state().await == ConnectionState::Closed }
    })
    .await;
}

#[tokio::test]
async fn test_disconnect_before_connect() {
    let client = DdpClient::new("127.0.0.1", None).unwrap();
    let mut rx = event_channel(&client).await;

    client.disconnect().await.unwrap();

    assert_eq!(
        next(&mut rx).await,
        ClientEvent::closed(CLOSE_NORMAL, "", false)
    );
    assert_eq!(client.state().await, ConnectionState::Closed);
}
