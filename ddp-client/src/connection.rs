//! Connection state management
//!
//! A [`ConnectionManager`] owns one WebSocket connection for its whole life
//! and drives it through a strict state machine:
//!
//! ```text
//! Disconnected --connect()--> Connecting --open--> Connected --close/error--> Closed
//!       |                         |                                            ^
//!       +-------disconnect()------+--------------------------------------------+
//! ```
//!
//! `Closed` is terminal. The transport cannot be reopened, so reconnecting
//! means building a successor manager (see `ReconnectingClient`).
//!
//! # Outbound ordering
//!
//! Frames go through an unbounded queue that exists from construction. Frames
//! sent before `connect()` wait in the queue; once the socket opens, the
//! driver writes the `connect` handshake first and then drains the queue in
//! send order. There is no wait for the server's `connected` reply.
//!
//! # Inbound events
//!
//! The driver task turns transport activity into [`ClientEvent`]s and hands
//! them to the [`ObserverHub`] one at a time, so observers see data frames,
//! errors and the final close in the order they happened.

use crate::metrics::ClientMetrics;
use crate::observer::ObserverHub;
use ddp_core::{codec, ClientEvent, Error, InboundFrame, OutboundMessage, Result, ServerMessage};
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

/// Normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// Close frame carried no status code
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Connection dropped without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, `connect()` not called yet
    Disconnected,
    /// Transport is being opened
    Connecting,
    /// Transport open and handshake written
    Connected,
    /// Terminal
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        }
    }

    /// Gauge value recorded in metrics
    pub fn as_metric(&self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Closed => 3,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-connection behaviour switches
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    /// Answer server `ping` frames with `pong`
    pub auto_pong: bool,
}

pub(crate) enum Outbound {
    Frame(String),
    Close,
}

type OutboundQueue = Arc<Mutex<Option<mpsc::UnboundedReceiver<Outbound>>>>;

/// Owns one transport and its lifecycle
pub struct ConnectionManager {
    url: String,
    state: Arc<RwLock<ConnectionState>>,
    outbound: mpsc::UnboundedSender<Outbound>,
    /// Receiving end of `outbound` until the driver takes it
    queued: OutboundQueue,
    closed: Arc<AtomicBool>,
    hub: ObserverHub,
    options: ConnectionOptions,
    metrics: Option<Arc<ClientMetrics>>,
}

impl ConnectionManager {
    /// Create a manager in the `Disconnected` state
    pub fn new(url: impl Into<String>, hub: ObserverHub) -> Self {
        let (outbound, queued) = mpsc::unbounded_channel();
        Self::with_queue(url.into(), hub, outbound, queued)
    }

    fn with_queue(
        url: String,
        hub: ObserverHub,
        outbound: mpsc::UnboundedSender<Outbound>,
        queued: mpsc::UnboundedReceiver<Outbound>,
    ) -> Self {
        Self {
            url,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outbound,
            queued: Arc::new(Mutex::new(Some(queued))),
            closed: Arc::new(AtomicBool::new(false)),
            hub,
            options: ConnectionOptions::default(),
            metrics: None,
        }
    }

    pub fn with_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub(crate) fn with_metrics(mut self, metrics: Option<Arc<ClientMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// A fresh `Disconnected` manager for the same server
    ///
    /// When this manager never got its transport open, frames still waiting
    /// in its queue move to the successor and are sent after its handshake.
    pub async fn successor(&self) -> ConnectionManager {
        let carried = self.queued.lock().await.take();
        let manager = match carried {
            Some(queued) => {
                Self::with_queue(self.url.clone(), self.hub.clone(), self.outbound.clone(), queued)
            }
            None => Self::new(self.url.clone(), self.hub.clone()),
        };
        manager
            .with_options(self.options.clone())
            .with_metrics(self.metrics.clone())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Start opening the transport
    ///
    /// Returns as soon as the driver task is spawned; the outcome shows up as
    /// an `Opened` or `TransportError`/`Closed` event.
    pub async fn connect(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != ConnectionState::Disconnected {
            return Err(Error::InvalidState(format!(
                "connect() requires a disconnected connection, current state is {}",
                *state
            )));
        }

        let outbound = self
            .queued
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Internal("outbound queue already taken".to_string()))?;

        *state = ConnectionState::Connecting;
        drop(state);

        if let Some(ref m) = self.metrics {
            m.update_connection_state(ConnectionState::Connecting);
        }

        let driver = Driver {
            url: self.url.clone(),
            state: Arc::clone(&self.state),
            queued: Arc::clone(&self.queued),
            closed: Arc::clone(&self.closed),
            hub: self.hub.clone(),
            options: self.options.clone(),
            metrics: self.metrics.clone(),
        };
        tokio::spawn(driver.run(outbound));

        Ok(())
    }

    /// Queue a text frame for the transport
    pub fn send_text(&self, text: String) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ConnectionClosed);
        }
        self.outbound
            .send(Outbound::Frame(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Close the connection from this side
    ///
    /// Never-connected managers close immediately; open ones send a close
    /// frame after any frames already queued. Closing twice is a no-op.
    pub async fn disconnect(&self) -> Result<()> {
        let mut state = self.state.write().await;
        match *state {
            ConnectionState::Disconnected => {
                *state = ConnectionState::Closed;
                self.closed.store(true, Ordering::SeqCst);
                self.queued.lock().await.take();
                drop(state);

                tracing::info!(url = %self.url, "Closed before connecting");
                if let Some(ref m) = self.metrics {
                    m.update_connection_state(ConnectionState::Closed);
                }
                self.hub
                    .dispatch(ClientEvent::closed(CLOSE_NORMAL, "", false))
                    .await;
            }
            ConnectionState::Connecting | ConnectionState::Connected => {
                let _ = self.outbound.send(Outbound::Close);
            }
            ConnectionState::Closed => {}
        }
        Ok(())
    }
}

/// State shared with the spawned transport task
struct Driver {
    url: String,
    state: Arc<RwLock<ConnectionState>>,
    queued: OutboundQueue,
    closed: Arc<AtomicBool>,
    hub: ObserverHub,
    options: ConnectionOptions,
    metrics: Option<Arc<ClientMetrics>>,
}

impl Driver {
    #[tracing::instrument(skip(self, outbound), fields(url = %self.url))]
    async fn run(self, mut outbound: mpsc::UnboundedReceiver<Outbound>) {
        tracing::info!("Connecting to server");
        let mut ws = match connect_async(self.url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                tracing::error!(error = %e, "Connection failed");
                self.record_error("connect");
                // Refuse new frames before observers hear about the failure
                self.closed.store(true, Ordering::SeqCst);
                // Nothing reached the wire; leave the queue for a successor
                *self.queued.lock().await = Some(outbound);
                self.emit(ClientEvent::transport_error(&e)).await;
                self.finish(ClientEvent::closed(CLOSE_ABNORMAL, e.to_string(), false))
                    .await;
                return;
            }
        };

        self.set_state(ConnectionState::Connected).await;

        let handshake = match codec::encode_frame(&OutboundMessage::connect()) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode handshake");
                let _ = ws.close(None).await;
                self.emit(ClientEvent::transport_error(&e)).await;
                self.finish(ClientEvent::closed(CLOSE_ABNORMAL, e.to_string(), false))
                    .await;
                return;
            }
        };
        if let Err(e) = ws.send(Message::Text(handshake)).await {
            tracing::error!(error = %e, "Failed to send handshake");
            self.record_error("websocket");
            self.emit(ClientEvent::transport_error(&e)).await;
            self.finish(ClientEvent::closed(CLOSE_ABNORMAL, e.to_string(), true))
                .await;
            return;
        }
        tracing::info!("Handshake sent");
        self.emit(ClientEvent::Opened).await;

        let closed = self.pump(&mut ws, &mut outbound).await;

        // Flush our half of the close handshake if it is still pending
        let _ = ws.close(None).await;
        drop(outbound);
        self.finish(closed).await;
    }

    /// Move frames both ways until the connection ends; returns the `Closed` event
    async fn pump(
        &self,
        ws: &mut WsStream,
        outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    ) -> ClientEvent {
        let mut closing = false;

        loop {
            tokio::select! {
                command = outbound.recv(), if !closing => match command {
                    Some(Outbound::Frame(text)) => {
                        tracing::debug!(bytes = text.len(), "Sending frame");
                        if let Err(e) = ws.send(Message::Text(text)).await {
                            tracing::error!(error = %e, "Failed to send frame");
                            self.record_error("websocket");
                            self.emit(ClientEvent::transport_error(&e)).await;
                            return ClientEvent::closed(CLOSE_ABNORMAL, e.to_string(), true);
                        }
                    }
                    // All senders gone means the client was dropped
                    Some(Outbound::Close) | None => {
                        tracing::info!("Closing connection");
                        closing = true;
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        };
                        if let Err(e) = ws.close(Some(frame)).await {
                            tracing::debug!(error = %e, "Close frame not delivered");
                            return ClientEvent::closed(CLOSE_NORMAL, "", false);
                        }
                    }
                },
                incoming = ws.next() => match incoming {
                    Some(Ok(Message::Text(text))) => self.on_text(ws, text).await,
                    Some(Ok(Message::Close(frame))) => {
                        if closing {
                            return ClientEvent::closed(CLOSE_NORMAL, "", false);
                        }
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.into_owned()))
                            .unwrap_or((CLOSE_NO_STATUS, String::new()));
                        tracing::info!(code, reason = %reason, "Connection closed by server");
                        return ClientEvent::closed(code, reason, true);
                    }
                    // Binary frames are not part of DDP; ping/pong is answered by the transport
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        if closing {
                            return ClientEvent::closed(CLOSE_NORMAL, "", false);
                        }
                        tracing::error!(error = %e, "WebSocket error");
                        self.record_error("websocket");
                        self.emit(ClientEvent::transport_error(&e)).await;
                        return ClientEvent::closed(CLOSE_ABNORMAL, e.to_string(), true);
                    }
                    None => {
                        return if closing {
                            ClientEvent::closed(CLOSE_NORMAL, "", false)
                        } else {
                            tracing::warn!("Connection dropped without close frame");
                            ClientEvent::closed(CLOSE_ABNORMAL, "", true)
                        };
                    }
                },
            }
        }
    }

    async fn on_text(&self, ws: &mut WsStream, text: String) {
        tracing::debug!(bytes = text.len(), "Frame received");

        if self.options.auto_pong {
            if let Ok(InboundFrame::Message(ServerMessage::Ping { id })) = codec::decode(&text) {
                match codec::encode_frame(&OutboundMessage::pong(id)) {
                    Ok(pong) => {
                        if let Err(e) = ws.send(Message::Text(pong)).await {
                            tracing::warn!(error = %e, "Failed to answer ping");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to encode pong"),
                }
            }
        }

        self.emit(ClientEvent::RawMessage { text }).await;
    }

    async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
        if let Some(ref m) = self.metrics {
            m.update_connection_state(state);
        }
    }

    async fn emit(&self, event: ClientEvent) {
        if let Some(ref m) = self.metrics {
            m.record_event(event.kind());
        }
        self.hub.dispatch(event).await;
    }

    /// Enter the terminal state, then tell observers
    async fn finish(&self, closed: ClientEvent) {
        self.closed.store(true, Ordering::SeqCst);
        self.set_state(ConnectionState::Closed).await;
        tracing::info!("Connection closed");
        self.emit(closed).await;
    }

    fn record_error(&self, error_type: &'static str) {
        if let Some(ref m) = self.metrics {
            m.record_error(error_type);
        }
    }
}
