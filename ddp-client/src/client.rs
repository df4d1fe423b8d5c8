//! DDP client over WebSocket
//!
//! `DdpClient` is the public surface: it issues method calls and
//! subscriptions, accepts pre-built frames, and fans inbound traffic out to
//! observers. It composes an [`IdentifierRegistry`], a [`ConnectionManager`]
//! and an [`ObserverHub`].
//!
//! # Client Lifecycle
//!
//! 1. **Build**: validate the server address; no I/O happens yet
//! 2. **Connect**: start opening the transport; returns immediately
//! 3. **Use**: `call`/`subscribe`/`unsubscribe` may be issued at any point,
//!    even before `connect()`; frames are queued and sent after the handshake
//! 4. **Close**: `disconnect()`, or the server closes; the client is then done
//!
//! Responses are not matched back to their requests. Each request returns
//! the correlation id it was sent with, and observers see the server's echo
//! of that id in the raw frames.
//!
//! # Cloning
//!
//! `DdpClient` is cheaply cloneable; all clones share one connection, one id
//! sequence and one set of observers.

use crate::client_builder::{ClientBuilder, ServerAddress};
use crate::connection::{ConnectionManager, ConnectionOptions, ConnectionState};
use crate::observer::{ObserverHub, ObserverId};
use crate::registry::{IdentifierRegistry, PendingRequest};
use crate::ClientMetrics;
use ddp_core::{
    codec, ClientEvent, CorrelationId, Error, InboundFrame, OutboundMessage, RequestKind, Result,
};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Meteor DDP client
#[derive(Clone)]
pub struct DdpClient {
    address: ServerAddress,
    registry: IdentifierRegistry,
    hub: ObserverHub,
    connection: Arc<ConnectionManager>,
    metrics: Option<Arc<ClientMetrics>>,
}

impl DdpClient {
    /// Client for `ws://host:port/websocket`; the port defaults to 3000
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Result<Self> {
        let address = ServerAddress::new(host, port)?;
        Ok(Self::from_parts(address, ConnectionOptions::default(), None))
    }

    pub fn builder(host: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(host)
    }

    pub(crate) fn from_parts(
        address: ServerAddress,
        options: ConnectionOptions,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        let hub = ObserverHub::new();
        let connection = ConnectionManager::new(address.url(), hub.clone())
            .with_options(options)
            .with_metrics(metrics.clone());

        if let Some(ref m) = metrics {
            m.update_connection_state(ConnectionState::Disconnected);
        }

        Self {
            address,
            registry: IdentifierRegistry::new(),
            hub,
            connection: Arc::new(connection),
            metrics,
        }
    }

    /// Same server, ids and observers, but a new `Disconnected` connection
    pub(crate) async fn successor(&self) -> DdpClient {
        Self {
            address: self.address.clone(),
            registry: self.registry.clone(),
            hub: self.hub.clone(),
            connection: Arc::new(self.connection.successor().await),
            metrics: self.metrics.clone(),
        }
    }

    /// Start connecting; the outcome is reported to observers
    ///
    /// Fails only if this client already connected or was closed.
    pub async fn connect(&self) -> Result<()> {
        self.connection.connect().await
    }

    /// Close the connection from this side
    pub async fn disconnect(&self) -> Result<()> {
        self.connection.disconnect().await
    }

    pub async fn state(&self) -> ConnectionState {
        self.connection.state().await
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// Invoke a server method
    ///
    /// Sends `{msg:"method", method, params, id}` and returns the id. The
    /// eventual `result` frame reaches observers carrying the same id.
    #[tracing::instrument(skip(self, params))]
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<CorrelationId> {
        self.issue(RequestKind::Method, method, params, |id, params| {
            OutboundMessage::method(method, params, id)
        })
        .await
    }

    /// Subscribe to a named record set
    ///
    /// Sends `{msg:"sub", name, params, id}` and returns the subscription id.
    #[tracing::instrument(skip(self, params))]
    pub async fn subscribe(&self, name: &str, params: Vec<Value>) -> Result<CorrelationId> {
        self.issue(RequestKind::Subscription, name, params, |id, params| {
            OutboundMessage::sub(name, params, id)
        })
        .await
    }

    /// Unsubscribe by subscription name
    ///
    /// The frame is `{msg:"unsub", id}` with a freshly allocated id; it does
    /// not reference the id the subscription was created with, so a DDP
    /// server will not match it to that subscription. Prefer
    /// [`DdpClient::unsubscribe_id`] against real servers.
    #[tracing::instrument(skip(self))]
    pub async fn unsubscribe(&self, name: &str) -> Result<CorrelationId> {
        self.issue(RequestKind::Unsubscription, name, Vec::new(), |id, _| {
            OutboundMessage::unsub(id)
        })
        .await
    }

    /// Unsubscribe the subscription created under `id`
    ///
    /// Sends `{msg:"unsub", id}` with the subscription's own id; no new id is
    /// consumed and nothing is recorded.
    pub async fn unsubscribe_id(&self, id: CorrelationId) -> Result<()> {
        match self.registry.get(id).await {
            Some(request) if request.kind == RequestKind::Subscription => {
                tracing::debug!(id = %id, name = %request.target, "Unsubscribing by id");
                self.send(&OutboundMessage::unsub(id))
            }
            _ => Err(Error::UnknownSubscription(id)),
        }
    }

    /// Allocate, record and send in one step so frames leave in id order
    async fn issue<F>(
        &self,
        kind: RequestKind,
        target: &str,
        params: Vec<Value>,
        frame: F,
    ) -> Result<CorrelationId>
    where
        F: FnOnce(CorrelationId, Vec<Value>) -> OutboundMessage,
    {
        let wire_params = params.clone();
        let (id, sent) = self
            .registry
            .register_then(kind, target, params, |id| self.send(&frame(id, wire_params)))
            .await;

        match sent {
            Ok(()) => {
                tracing::debug!(id = %id, kind = kind.as_str(), "Request sent");
                Ok(id)
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Request not sent");
                Err(e)
            }
        }
    }

    /// Serialize a frame and hand it to the transport
    ///
    /// Frames sent before the connection opens are queued behind the
    /// handshake. Fails with `ConnectionClosed` once the connection is done.
    pub fn send(&self, frame: &OutboundMessage) -> Result<()> {
        let text = codec::encode_frame(frame)?;
        self.connection.send_text(text)?;
        if let Some(ref m) = self.metrics {
            m.record_frame(frame.kind().unwrap_or("unknown"));
        }
        Ok(())
    }

    /// Deliver raw server text to every observer, unparsed
    ///
    /// Frames read off the socket take the same path. Must not be called
    /// from inside an observer.
    pub async fn received(&self, raw: impl Into<String>) {
        let event = ClientEvent::raw(raw);
        if let Some(ref m) = self.metrics {
            m.record_event(event.kind());
        }
        self.hub.dispatch(event).await;
    }

    /// Observe typed events
    pub async fn add_observer<F, Fut>(&self, observer: F) -> ObserverId
    where
        F: Fn(ClientEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hub.add_observer(observer).await
    }

    /// Observe the text stream: raw frames plus `"WebSocketClient ..."` notices
    pub async fn add_text_observer<F, Fut>(&self, observer: F) -> ObserverId
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hub.add_text_observer(observer).await
    }

    /// Observe decoded server frames
    pub async fn add_message_observer<F, Fut>(&self, observer: F) -> ObserverId
    where
        F: Fn(InboundFrame) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hub.add_message_observer(observer).await
    }

    pub async fn remove_observer(&self, id: ObserverId) -> bool {
        self.hub.remove_observer(id).await
    }

    /// Every request recorded so far, oldest first
    pub async fn pending_requests(&self) -> Vec<PendingRequest> {
        self.registry.pending().await
    }

    pub async fn pending(&self, id: CorrelationId) -> Option<PendingRequest> {
        self.registry.get(id).await
    }

    /// Forget the record for `id`; the id itself is never reissued
    pub async fn purge(&self, id: CorrelationId) -> Option<PendingRequest> {
        self.registry.purge(id).await
    }

    pub fn registry(&self) -> &IdentifierRegistry {
        &self.registry
    }

    pub fn observers(&self) -> &ObserverHub {
        &self.hub
    }

    pub(crate) fn metrics(&self) -> Option<&Arc<ClientMetrics>> {
        self.metrics.as_ref()
    }
}
