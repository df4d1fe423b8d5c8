//! Correlation id integration tests
//!
//! Ids come from one sequence shared by calls, subscriptions and
//! unsubscriptions, and frames reach the server in id order.

mod common;

use common::{handshake, meteor_reply, MockDdpServer};
use ddp_client::DdpClient;
use ddp_core::{CorrelationId, Error, InboundFrame, RequestKind, ServerMessage};
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;

async fn connected_client(server: &mut MockDdpServer) -> DdpClient {
    let client = DdpClient::new("127.0.0.1", Some(server.port())).unwrap();
    client.connect().await.unwrap();
    assert_eq!(server.wait_for_json().await, handshake());
    client
}

#[tokio::test]
async fn test_call_subscribe_unsubscribe_frames() {
    let mut server = MockDdpServer::new().await;
    let client = connected_client(&mut server).await;

    client.call("foo", vec![]).await.unwrap();
    client.subscribe("items", vec![]).await.unwrap();
    client.unsubscribe("items").await.unwrap();

    assert_eq!(
        server.wait_for_json().await,
        json!({"msg": "method", "method": "foo", "params": [], "id": "1"})
    );
    assert_eq!(
        server.wait_for_json().await,
        json!({"msg": "sub", "name": "items", "params": [], "id": "2"})
    );
    // Carries neither the name nor the subscription's id
    assert_eq!(server.wait_for_json().await, json!({"msg": "unsub", "id": "3"}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_get_every_id_once() {
    const CALLS: u64 = 100;

    let mut server = MockDdpServer::new().await;
    let client = connected_client(&mut server).await;

    let mut tasks = Vec::new();
    for i in 0..CALLS {
        let client = client.clone();
        tasks.push(tokio::spawn(async move {
            if i % 3 == 0 {
                client.subscribe(&format!("sub{}", i), vec![]).await
            } else {
                client.call(&format!("m{}", i), vec![json!(i)]).await
            }
        }));
    }

    let mut returned = HashSet::new();
    for task in tasks {
        assert!(returned.insert(task.await.unwrap().unwrap().get()));
    }
    assert_eq!(returned, (1..=CALLS).collect::<HashSet<u64>>());

    // Frames arrive in exactly id order
    for expected in 1..=CALLS {
        let frame = server.wait_for_json().await;
        assert_eq!(frame["id"], json!(expected.to_string()));
    }
}

#[tokio::test]
async fn test_unsubscribe_by_id() {
    let mut server = MockDdpServer::new().await;
    let client = connected_client(&mut server).await;

    let sub = client.subscribe("items", vec![]).await.unwrap();
    client.unsubscribe_id(sub).await.unwrap();
    let next = client.call("after", vec![]).await.unwrap();

    server.wait_for_json().await;
    assert_eq!(server.wait_for_json().await, json!({"msg": "unsub", "id": "1"}));
    assert_eq!(next, CorrelationId::new(2));

    assert_eq!(
        client.unsubscribe_id(next).await,
        Err(Error::UnknownSubscription(next))
    );
    server.wait_for_json().await;
    assert!(!server.has_more(Duration::from_millis(100)).await);
}

#[tokio::test]
async fn test_responses_correlate_through_pending_records() {
    let mut server = MockDdpServer::with_handler(meteor_reply).await;
    let client = DdpClient::new("127.0.0.1", Some(server.port())).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .add_message_observer(move |frame| {
            let tx = tx.clone();
            async move {
                if let InboundFrame::Message(message) = frame {
                    if let Some(id) = message.correlation_id() {
                        let _ = tx.send((id, message));
                    }
                }
            }
        })
        .await;

    client.connect().await.unwrap();
    let call = client.call("listItems", vec![json!("all")]).await.unwrap();
    let sub = client.subscribe("items", vec![]).await.unwrap();
    client.unsubscribe_id(sub).await.unwrap();
    server.wait_for_frame().await.unwrap();

    let (id, message) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(id, call);
    assert!(matches!(message, ServerMessage::Result { error: None, .. }));
    let record = client.pending(id).await.unwrap();
    assert_eq!(record.kind, RequestKind::Method);
    assert_eq!(record.target, "listItems");
    assert_eq!(record.snapshot, r#"["all"]"#);

    let (id, message) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(id, sub);
    assert!(matches!(message, ServerMessage::Nosub { .. }));
    assert_eq!(client.pending(id).await.unwrap().kind, RequestKind::Subscription);
}
