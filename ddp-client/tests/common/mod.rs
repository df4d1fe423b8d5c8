//! Common test utilities for ddp-client integration tests
//!
//! A loopback WebSocket server that records every text frame a client sends
//! and answers through a scripted handler.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// A frame the server received, tagged with the connection it arrived on
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    /// 0 for the first accepted connection, 1 for the next, ...
    pub connection: usize,
    pub text: String,
}

impl ReceivedFrame {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap()
    }
}

/// Mock DDP server for client testing
pub struct MockDdpServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    frames: mpsc::UnboundedReceiver<ReceivedFrame>,
    accepted: Arc<AtomicUsize>,
}

impl MockDdpServer {
    /// A server that records frames and never answers
    pub async fn new() -> Self {
        Self::with_handler(|_, _| Vec::new()).await
    }

    /// A server that answers each received frame with the handler's messages
    ///
    /// The handler gets the connection index and the frame text.
    pub async fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(usize, &str) -> Vec<Message> + Send + Sync + 'static,
    {
        Self::on_port(0, handler).await
    }

    /// Like `with_handler`, listening on a chosen loopback port
    pub async fn on_port<F>(port: u16, handler: F) -> Self
    where
        F: Fn(usize, &str) -> Vec<Message> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (frame_tx, frames) = mpsc::unbounded_channel();
        let accepted = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(handler);

        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accept_result = listener.accept() => {
                        let Ok((stream, _)) = accept_result else { continue };
                        let connection = counter.fetch_add(1, Ordering::SeqCst);
                        let frame_tx = frame_tx.clone();
                        let handler = Arc::clone(&handler);

                        tokio::spawn(async move {
                            let Ok(mut ws) = accept_async(stream).await else { return };
                            while let Some(Ok(msg)) = ws.next().await {
                                if let Message::Text(text) = msg {
                                    let _ = frame_tx.send(ReceivedFrame {
                                        connection,
                                        text: text.clone(),
                                    });
                                    for reply in handler(connection, &text) {
                                        if ws.send(reply).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            frames,
            accepted,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn url(&self) -> String {
        format!("ws://{}/websocket", self.addr)
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Next received frame, or `None` after 5 seconds
    pub async fn wait_for_frame(&mut self) -> Option<ReceivedFrame> {
        tokio::time::timeout(Duration::from_secs(5), self.frames.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next received frame parsed as JSON
    pub async fn wait_for_json(&mut self) -> Value {
        self.wait_for_frame()
            .await
            .expect("no frame received")
            .json()
    }

    /// Whether another frame arrives within `wait`
    pub async fn has_more(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.frames.recv())
            .await
            .map(|frame| frame.is_some())
            .unwrap_or(false)
    }

    /// Stop accepting; open connections stay up
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// The handshake every connection must start with
pub fn handshake() -> Value {
    json!({"msg": "connect", "version": "pre1", "support": ["pre1"]})
}

pub fn is_handshake(text: &str) -> bool {
    serde_json::from_str::<Value>(text).ok() == Some(handshake())
}

pub fn text(value: Value) -> Message {
    Message::Text(value.to_string())
}

pub fn close(code: CloseCode, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code,
        reason: reason.into(),
    }))
}

/// Replies a Meteor server would give: `connected`, `result`, `ready`, `nosub`
pub fn meteor_reply(_connection: usize, frame: &str) -> Vec<Message> {
    let frame: Value = match serde_json::from_str(frame) {
        Ok(frame) => frame,
        Err(_) => return Vec::new(),
    };
    let id = frame["id"].clone();
    match frame["msg"].as_str() {
        Some("connect") => vec![
            text(json!({"server_id": "0"})),
            text(json!({"msg": "connected", "session": "mock-session"})),
        ],
        Some("method") => vec![
            text(json!({"msg": "result", "id": id, "result": frame["method"]})),
            text(json!({"msg": "updated", "methods": [id]})),
        ],
        Some("sub") => vec![text(json!({"msg": "ready", "subs": [id]}))],
        Some("unsub") => vec![text(json!({"msg": "nosub", "id": id}))],
        _ => Vec::new(),
    }
}

/// Port with nothing listening on it
pub async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll `check` until it holds, panicking after 5 seconds
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_creation() {
        let server = MockDdpServer::new().await;
        assert!(server.url().starts_with("ws://127.0.0.1:"));
        assert!(server.url().ends_with("/websocket"));
        assert_eq!(server.connections(), 0);
        server.shutdown().await;
    }

    #[test]
    fn test_meteor_reply_echoes_ids() {
        let replies = meteor_reply(0, r#"{"msg":"sub","name":"items","params":[],"id":"4"}"#);
        assert_eq!(replies.len(), 1);
        match &replies[0] {
            Message::Text(text) => assert_eq!(text, r#"{"msg":"ready","subs":["4"]}"#),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_handshake_detection() {
        assert!(is_handshake(
            r#"{"msg":"connect","support":["pre1"],"version":"pre1"}"#
        ));
        assert!(!is_handshake(r#"{"msg":"connect"}"#));
    }
}
