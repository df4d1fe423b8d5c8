//! Observer fan-out for inbound events
//!
//! Every inbound event (a raw server frame, a transport error, a close) is
//! delivered to every registered observer, one event at a time and in the
//! order the events reached the hub. There is no filtering, buffering or
//! backpressure: `dispatch` awaits each observer in turn before the next
//! event can start.
//!
//! Three registration flavours sit on the same fan-out:
//!
//! - [`ObserverHub::add_observer`]: typed [`ClientEvent`]s
//! - [`ObserverHub::add_text_observer`]: the legacy text rendering, where
//!   lifecycle events arrive as `"WebSocketClient ..."` strings
//! - [`ObserverHub::add_message_observer`]: server frames decoded into
//!   [`InboundFrame`]s; frames that fail to decode are skipped
//!
//! # Removal
//!
//! An observer removed while an event is being delivered may still receive
//! that one event, but never a later one.
//!
//! Observers must not call [`ObserverHub::dispatch`] (or
//! `DdpClient::received`) from inside their own callback; delivery is
//! serialized and that call would wait on itself.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ddp_client::ObserverHub;
//!
//! # async fn example(hub: ObserverHub) {
//! hub.add_text_observer(|text| async move {
//!     println!("Received response: {}", text);
//! })
//! .await;
//! # }
//! ```

use ddp_core::{ClientEvent, InboundFrame};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Type for observer functions
pub type ObserverFn = Arc<dyn Fn(ClientEvent) -> BoxFuture + Send + Sync>;

/// Handle returned on registration, used to remove the observer again
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

/// Multicast delivery of inbound events
#[derive(Clone)]
pub struct ObserverHub {
    observers: Arc<RwLock<Vec<(ObserverId, ObserverFn)>>>,
    /// Held for the whole fan-out of one event
    delivery: Arc<Mutex<()>>,
    next_id: Arc<AtomicU64>,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self {
            observers: Arc::new(RwLock::new(Vec::new())),
            delivery: Arc::new(Mutex::new(())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register an observer of typed events
    pub async fn add_observer<F, Fut>(&self, observer: F) -> ObserverId
    where
        F: Fn(ClientEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let observer: ObserverFn =
            Arc::new(move |event: ClientEvent| -> BoxFuture { Box::pin(observer(event)) });
        self.insert(observer).await
    }

    /// Register an observer of the legacy text stream
    ///
    /// `Opened` has no text rendering and is not delivered.
    pub async fn add_text_observer<F, Fut>(&self, observer: F) -> ObserverId
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let observer: ObserverFn = Arc::new(move |event: ClientEvent| -> BoxFuture {
            match event.legacy_text() {
                Some(text) => Box::pin(observer(text)),
                None => Box::pin(async {}),
            }
        });
        self.insert(observer).await
    }

    /// Register an observer of decoded server frames
    pub async fn add_message_observer<F, Fut>(&self, observer: F) -> ObserverId
    where
        F: Fn(InboundFrame) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let observer: ObserverFn = Arc::new(move |event: ClientEvent| -> BoxFuture {
            match event.parse() {
                Some(Ok(frame)) => Box::pin(observer(frame)),
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Skipping undecodable frame");
                    Box::pin(async {})
                }
                None => Box::pin(async {}),
            }
        });
        self.insert(observer).await
    }

    async fn insert(&self, observer: ObserverFn) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().await.push((id, observer));
        id
    }

    /// Remove an observer; returns `false` if it was not registered
    pub async fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write().await;
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    /// Deliver one event to every registered observer
    pub async fn dispatch(&self, event: ClientEvent) {
        let _delivery = self.delivery.lock().await;

        let observers: Vec<ObserverFn> = self
            .observers
            .read()
            .await
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        tracing::trace!(
            kind = event.kind(),
            observers = observers.len(),
            "Dispatching event"
        );

        for observer in observers {
            observer(event.clone()).await;
        }
    }

    pub async fn len(&self) -> usize {
        self.observers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ObserverHub {
    fn default() -> Self {
        Self::new()
    }
}
