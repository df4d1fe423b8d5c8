//! Reconnection layered over single-use connections
//!
//! A [`ReconnectingClient`] runs a sequence of [`DdpClient`] generations.
//! Every generation shares one id sequence and one set of observers, so ids
//! keep increasing across reconnects and observers never need re-registering.
//!
//! When a generation closes for any reason other than
//! [`ReconnectingClient::disconnect`], the supervisor immediately installs a
//! fresh `Disconnected` generation (requests issued from then on queue in it)
//! and connects it once the [`ReconnectionStrategy`] delay has passed. Frames
//! queued in a generation that never opened move to its successor. Once the
//! strategy gives up, the closed generation stays current.
//!
//! Nothing is replayed: subscriptions from an earlier generation are not
//! re-established automatically. Observers see `Opened` for each generation
//! and can resubscribe there.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ddp_client::{ClientBuilder, FixedDelay};
//! use std::time::Duration;
//!
//! # async fn example() -> ddp_core::Result<()> {
//! let client = ClientBuilder::new("localhost")
//!     .with_reconnect(Box::new(FixedDelay::new(Duration::from_secs(2))))
//!     .build_reconnecting()?;
//!
//! client.connect().await?;
//! client.subscribe("allPositions", vec![]).await?;
//! # Ok(())
//! # }
//! ```

use crate::client_builder::ServerAddress;
use crate::connection::ConnectionState;
use crate::observer::ObserverId;
use crate::reconnect::ReconnectionStrategy;
use crate::registry::PendingRequest;
use crate::DdpClient;
use ddp_core::{ClientEvent, CorrelationId, Error, InboundFrame, OutboundMessage, Result};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Mutex, RwLock};

struct Supervised {
    current: RwLock<DdpClient>,
    strategy: Mutex<Box<dyn ReconnectionStrategy>>,
    started: AtomicBool,
    shutdown: AtomicBool,
    generation: AtomicU64,
}

/// DDP client that reconnects according to a strategy
#[derive(Clone)]
pub struct ReconnectingClient {
    inner: Arc<Supervised>,
}

impl ReconnectingClient {
    /// Supervise `client` as the first generation
    pub fn new(client: DdpClient, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        Self {
            inner: Arc::new(Supervised {
                current: RwLock::new(client),
                strategy: Mutex::new(strategy),
                started: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Start the first connection and the supervisor
    pub async fn connect(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidState(
                "reconnecting client already started".to_string(),
            ));
        }

        let client = self.current().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = client
            .add_observer(move |event| {
                if event.is_lifecycle() {
                    let _ = tx.send(event);
                }
                std::future::ready(())
            })
            .await;

        tokio::spawn(supervise(Arc::downgrade(&self.inner), rx, observer));

        client.connect().await
    }

    /// Close the current connection and stop reconnecting
    pub async fn disconnect(&self) -> Result<()> {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.current().await.disconnect().await
    }

    /// The generation requests currently go to
    pub async fn current(&self) -> DdpClient {
        self.inner.current.read().await.clone()
    }

    /// Number of connections replaced so far
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> ConnectionState {
        self.current().await.state().await
    }

    pub async fn address(&self) -> ServerAddress {
        self.current().await.address().clone()
    }

    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<CorrelationId> {
        self.current().await.call(method, params).await
    }

    pub async fn subscribe(&self, name: &str, params: Vec<Value>) -> Result<CorrelationId> {
        self.current().await.subscribe(name, params).await
    }

    pub async fn unsubscribe(&self, name: &str) -> Result<CorrelationId> {
        self.current().await.unsubscribe(name).await
    }

    pub async fn unsubscribe_id(&self, id: CorrelationId) -> Result<()> {
        self.current().await.unsubscribe_id(id).await
    }

    pub async fn send(&self, frame: &OutboundMessage) -> Result<()> {
        self.current().await.send(frame)
    }

    pub async fn received(&self, raw: impl Into<String>) {
        self.current().await.received(raw).await
    }

    pub async fn add_observer<F, Fut>(&self, observer: F) -> ObserverId
    where
        F: Fn(ClientEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.current().await.add_observer(observer).await
    }

    pub async fn add_text_observer<F, Fut>(&self, observer: F) -> ObserverId
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.current().await.add_text_observer(observer).await
    }

    pub async fn add_message_observer<F, Fut>(&self, observer: F) -> ObserverId
    where
        F: Fn(InboundFrame) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.current().await.add_message_observer(observer).await
    }

    pub async fn remove_observer(&self, id: ObserverId) -> bool {
        self.current().await.remove_observer(id).await
    }

    pub async fn pending_requests(&self) -> Vec<PendingRequest> {
        self.current().await.pending_requests().await
    }

    pub async fn pending(&self, id: CorrelationId) -> Option<PendingRequest> {
        self.current().await.pending(id).await
    }

    pub async fn purge(&self, id: CorrelationId) -> Option<PendingRequest> {
        self.current().await.purge(id).await
    }
}

/// React to lifecycle events until shut down or out of attempts
///
/// Holds only a weak reference between events so dropping every
/// `ReconnectingClient` handle ends supervision.
async fn supervise(
    client: Weak<Supervised>,
    mut lifecycle: mpsc::UnboundedReceiver<ClientEvent>,
    observer: ObserverId,
) {
    let mut attempt: u32 = 0;

    while let Some(event) = lifecycle.recv().await {
        let Some(inner) = client.upgrade() else {
            return;
        };

        match event {
            ClientEvent::Opened => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt, "Reconnected");
                    if let Some(m) = inner.current.read().await.metrics() {
                        m.record_reconnection_success();
                    }
                }
                attempt = 0;
                inner.strategy.lock().await.reset();
            }
            ClientEvent::Closed { code, .. } => {
                if inner.shutdown.load(Ordering::SeqCst) {
                    break;
                }

                let delay = inner.strategy.lock().await.next_delay(attempt);
                let Some(delay) = delay else {
                    // The closed generation stays current, so later requests fail
                    tracing::warn!(code, attempts = attempt, "Giving up reconnecting");
                    inner.shutdown.store(true, Ordering::SeqCst);
                    break;
                };

                // Checked under the write lock: `disconnect` reads `current`
                // after raising the flag, so it closes whichever generation wins
                let next = {
                    let mut current = inner.current.write().await;
                    if inner.shutdown.load(Ordering::SeqCst) {
                        None
                    } else {
                        let next = current.successor().await;
                        *current = next.clone();
                        Some(next)
                    }
                };
                let Some(next) = next else {
                    break;
                };
                let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

                attempt += 1;
                tracing::info!(code, attempt, generation, delay = ?delay, "Reconnecting");
                if let Some(m) = next.metrics() {
                    m.record_reconnection_attempt();
                }

                drop(inner);
                tokio::time::sleep(delay).await;

                let Some(inner) = client.upgrade() else {
                    return;
                };
                if inner.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = next.connect().await {
                    tracing::warn!(error = %e, "Reconnection not started");
                }
            }
            _ => {}
        }
    }

    if let Some(inner) = client.upgrade() {
        inner.current.read().await.remove_observer(observer).await;
    }
    tracing::debug!("Supervisor stopped");
}
