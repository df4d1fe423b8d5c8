//! Correlation id allocation and pending-request bookkeeping
//!
//! Every `call`, `subscribe` and `unsubscribe` consumes one id from a single
//! per-client sequence that starts at 1 and never skips or repeats, even
//! when many tasks issue requests at once. The registry also remembers what
//! each id was issued for, so observers that see a `result` or `nosub`
//! echoing an id can look the original request up.
//!
//! # Request Lifecycle
//!
//! 1. **Allocate**: take the next id in the sequence
//! 2. **Record**: store the [`PendingRequest`] under that id
//! 3. **Send**: hand the frame to the connection while still holding the lock
//!
//! Steps 1-3 run under one lock, so a record is complete before its id can
//! appear on the wire, and frames reach the transport in id order.
//!
//! Records are kept until purged explicitly; a response does not remove them.

use ddp_core::{CorrelationId, RequestKind};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Metadata about a request the client originated
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub id: CorrelationId,
    pub kind: RequestKind,
    /// Method name for calls, subscription name for sub/unsub
    pub target: String,
    pub params: Vec<Value>,
    /// `params` as JSON text, captured at registration
    pub snapshot: String,
}

#[derive(Default)]
struct RegistryState {
    last_id: u64,
    pending: BTreeMap<CorrelationId, PendingRequest>,
}

impl RegistryState {
    fn allocate(&mut self) -> CorrelationId {
        self.last_id += 1;
        CorrelationId::new(self.last_id)
    }
}

/// Allocates correlation ids and records what they were for
#[derive(Clone, Default)]
pub struct IdentifierRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next id without recording anything against it
    pub async fn next_id(&self) -> CorrelationId {
        self.state.lock().await.allocate()
    }

    /// Allocate an id and record the request it belongs to
    pub async fn register(
        &self,
        kind: RequestKind,
        target: impl Into<String>,
        params: Vec<Value>,
    ) -> CorrelationId {
        self.register_then(kind, target, params, |_| ()).await.0
    }

    /// Allocate, record, then run `then` with the new id before releasing the lock
    ///
    /// Returning `false` from `then` withdraws the record again (the id stays
    /// consumed). The client uses this to enqueue the outbound frame so that
    /// frames leave in id order.
    pub(crate) async fn register_then<F, T>(
        &self,
        kind: RequestKind,
        target: impl Into<String>,
        params: Vec<Value>,
        then: F,
    ) -> (CorrelationId, T)
    where
        F: FnOnce(CorrelationId) -> T,
        T: Keep,
    {
        let mut state = self.state.lock().await;
        let id = state.allocate();
        let snapshot = Value::Array(params.clone()).to_string();
        state.pending.insert(
            id,
            PendingRequest {
                id,
                kind,
                target: target.into(),
                params,
                snapshot,
            },
        );

        let outcome = then(id);
        if !outcome.keep() {
            state.pending.remove(&id);
        }
        (id, outcome)
    }

    /// Look up the request recorded under `id`
    pub async fn get(&self, id: CorrelationId) -> Option<PendingRequest> {
        self.state.lock().await.pending.get(&id).cloned()
    }

    /// All recorded requests in creation order
    pub async fn pending(&self) -> Vec<PendingRequest> {
        self.state.lock().await.pending.values().cloned().collect()
    }

    /// Forget the request recorded under `id`
    pub async fn purge(&self, id: CorrelationId) -> Option<PendingRequest> {
        self.state.lock().await.pending.remove(&id)
    }

    /// Forget every recorded request; the id sequence is not reset
    pub async fn purge_all(&self) -> usize {
        let mut state = self.state.lock().await;
        let count = state.pending.len();
        state.pending.clear();
        count
    }

    /// The most recently allocated id, if any
    pub async fn last_id(&self) -> Option<CorrelationId> {
        match self.state.lock().await.last_id {
            0 => None,
            n => Some(CorrelationId::new(n)),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Whether a registration should stay recorded after its follow-up step
pub(crate) trait Keep {
    fn keep(&self) -> bool;
}

impl Keep for () {
    fn keep(&self) -> bool {
        true
    }
}

impl<T, E> Keep for Result<T, E> {
    fn keep(&self) -> bool {
        self.is_ok()
    }
}
