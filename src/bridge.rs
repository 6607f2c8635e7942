// src/bridge.rs

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use dashmap::DashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

/// Event kind the root coordinator listens on to switch flows.
pub const FLOW_TRIGGER: &str = "flow.trigger";

/// Payload of a [`FLOW_TRIGGER`] event. `flow_kind` names the flow to
/// enter; an absent or unrecognized kind makes the whole event a no-op.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FlowTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_kind: Option<String>,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("a global event bridge is already installed")]
    AlreadyInstalled,
}

type BridgeHandler = Arc<dyn Fn(&Value) + Send + Sync>;

struct Envelope {
    kind: String,
    payload: Value,
}

/// Process-wide publish/subscribe point decoupling distant code from the
/// coordination tree.
///
/// `publish` may be called from any task or thread; events are queued and
/// dispatched by a single pump task, which is what serializes all
/// coordination work onto one logical execution context. Publishing is
/// fire-and-forget: no delivery report, no error toward the publisher.
pub struct EventBridge {
    subscribers: Arc<DashMap<String, Vec<(u64, BridgeHandler)>>>,
    tx: UnboundedSender<Envelope>,
    next_id: AtomicU64,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl EventBridge {
    /// Create the bridge and spawn its pump task. Must run inside a tokio
    /// runtime.
    pub fn new() -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let subscribers: Arc<DashMap<String, Vec<(u64, BridgeHandler)>>> =
            Arc::new(DashMap::new());

        let dispatch_subscribers = subscribers.clone();
        let pump = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let handlers: Vec<(u64, BridgeHandler)> = dispatch_subscribers
                    .get(&envelope.kind)
                    .map(|entry| entry.value().clone())
                    .unwrap_or_default();
                for (id, handler) in handlers {
                    // a cancel processed earlier in this dispatch must win;
                    // check liveness without holding the map guard
                    let live = dispatch_subscribers
                        .get(&envelope.kind)
                        .map_or(false, |entry| entry.iter().any(|(i, _)| *i == id));
                    if live {
                        handler(&envelope.payload);
                    }
                }
            }
        });

        Arc::new(Self {
            subscribers,
            tx,
            next_id: AtomicU64::new(0),
            pump: Mutex::new(Some(pump)),
        })
    }

    /// Register `handler` for every future event of `kind`.
    pub fn subscribe<F>(&self, kind: &str, handler: F) -> BridgeSubscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .entry(kind.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        BridgeSubscription {
            kind: kind.to_string(),
            id,
            subscribers: Arc::downgrade(&self.subscribers),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Queue an event for dispatch. Never blocks; if the pump is gone the
    /// event is dropped, since no one is listening anymore.
    pub fn publish(&self, kind: &str, payload: Value) {
        let _ = self.tx.send(Envelope {
            kind: kind.to_string(),
            payload,
        });
    }

    /// Convenience for the one event the runtime itself understands.
    pub fn publish_trigger(&self, flow_kind: Option<&str>) {
        let trigger = FlowTrigger {
            flow_kind: flow_kind.map(|k| k.to_string()),
        };
        match serde_json::to_value(&trigger) {
            Ok(payload) => self.publish(FLOW_TRIGGER, payload),
            Err(e) => debug!(?e, "could not encode flow trigger"),
        }
    }

    /// Abort the pump task. Events published afterwards are dropped.
    pub fn shutdown(&self) {
        if let Some(handle) = self.pump.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub fn subscriber_count(&self, kind: &str) -> usize {
        self.subscribers.get(kind).map_or(0, |entry| entry.len())
    }
}

/// Cancellation handle for one bridge subscription.
#[derive(Clone)]
pub struct BridgeSubscription {
    kind: String,
    id: u64,
    subscribers: Weak<DashMap<String, Vec<(u64, BridgeHandler)>>>,
    cancelled: Arc<AtomicBool>,
}

impl BridgeSubscription {
    /// Sever the subscription; repeated cancels are no-ops.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(subscribers) = self.subscribers.upgrade() {
            if let Some(mut entry) = subscribers.get_mut(&self.kind) {
                entry.retain(|(id, _)| *id != self.id);
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for BridgeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSubscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

static GLOBAL_BRIDGE: OnceLock<Arc<EventBridge>> = OnceLock::new();

/// Install `bridge` as the process-wide instance distant code may publish
/// through. Coordinators still receive the bridge by injection; the global
/// exists for code with no path to the tree.
pub fn install_global(bridge: Arc<EventBridge>) -> Result<(), BridgeError> {
    GLOBAL_BRIDGE
        .set(bridge)
        .map_err(|_| BridgeError::AlreadyInstalled)
}

pub fn global() -> Option<Arc<EventBridge>> {
    GLOBAL_BRIDGE.get().cloned()
}
