// src/registry.rs

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::channel::{ResultChannel, Subscription};
use crate::unit::FlowUnit;

/// Owning map from child identity to the child unit plus the subscription
/// on its result channel. Every entry holds a live, not-yet-cancelled
/// handle; `clear` cancels each handle before dropping the entry so a late
/// emission can never touch a torn-down parent.
pub struct FlowRegistry {
    children: Arc<DashMap<Uuid, ChildEntry>>,
}

struct ChildEntry {
    unit: Arc<dyn FlowUnit>,
    subscription: Subscription,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self {
            children: Arc::new(DashMap::new()),
        }
    }

    /// The coordination protocol: subscribe to the child's result channel,
    /// register the child, then start it.
    ///
    /// The installed handler first detaches the child (cancels the handle,
    /// removes the entry) and then runs `on_result`. Because the
    /// subscription exists strictly before `start()`, a child that emits
    /// synchronously inside `start()` is still observed. The returned
    /// handle is a clone of the registered one, for callers that want to
    /// release interest early.
    pub fn coordinate<C, R, F>(
        &self,
        child: Arc<C>,
        channel: &ResultChannel<R>,
        on_result: F,
    ) -> Subscription
    where
        C: FlowUnit + 'static,
        R: Clone + Send + 'static,
        F: Fn(R) + Send + Sync + 'static,
    {
        let id = child.identity();
        // weak: the child's channel must never keep the parent's subtree alive
        let children = Arc::downgrade(&self.children);
        let subscription = channel.subscribe(move |result: R| {
            if let Some(children) = children.upgrade() {
                if let Some((_, entry)) = children.remove(&id) {
                    entry.subscription.cancel();
                }
            }
            on_result(result);
        });

        self.attach(child.clone(), subscription.clone());
        child.start();
        subscription
    }

    /// Insert a child with the subscription handle guarding its result.
    pub fn attach(&self, unit: Arc<dyn FlowUnit>, subscription: Subscription) {
        self.children
            .insert(unit.identity(), ChildEntry { unit, subscription });
    }

    /// Cancel the child's subscription and drop it from the map. Detaching
    /// an absent child is a no-op: duplicate results may race a detach that
    /// already happened.
    pub fn detach(&self, id: Uuid) {
        if let Some((_, entry)) = self.children.remove(&id) {
            entry.subscription.cancel();
        } else {
            debug!(%id, "detach of absent child ignored");
        }
    }

    /// Cancel every handle, ask every child to release its own descendants,
    /// and empty the map. Safe to call from multiple cascading teardown
    /// paths; clearing an empty registry does nothing.
    pub fn clear(&self) {
        let ids: Vec<Uuid> = self.children.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, entry)) = self.children.remove(&id) {
                entry.subscription.cancel();
                entry.unit.clear();
            }
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.children.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FlowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<Uuid> = self.children.iter().map(|entry| *entry.key()).collect();
        f.debug_struct("FlowRegistry").field("children", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::StartGate;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Leaf unit that can optionally emit as part of `start()`.
    struct Probe {
        identity: Uuid,
        gate: StartGate,
        signal: ResultChannel<u32>,
        emit_on_start: Option<u32>,
        cleared: Arc<AtomicUsize>,
    }

    impl Probe {
        fn new(emit_on_start: Option<u32>) -> Arc<Self> {
            Arc::new(Self {
                identity: Uuid::new_v4(),
                gate: StartGate::new(),
                signal: ResultChannel::new(),
                emit_on_start,
                cleared: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    impl FlowUnit for Probe {
        fn identity(&self) -> Uuid {
            self.identity
        }

        fn start(&self) {
            self.gate.arm("Probe");
            if let Some(value) = self.emit_on_start {
                self.signal.emit(value);
            }
        }

        fn clear(&self) {
            self.cleared.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_coordinate_registers_and_starts() {
        let registry = FlowRegistry::new();
        let child = Probe::new(None);

        registry.coordinate(child.clone(), &child.signal, |_| {});
        assert!(child.gate.is_armed());
        assert!(registry.contains(child.identity()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_result_detaches_then_runs_continuation() {
        let registry = FlowRegistry::new();
        let child = Probe::new(None);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        registry.coordinate(child.clone(), &child.signal, move |v| {
            sink.lock().unwrap().push(v)
        });

        child.signal.emit(42);
        assert_eq!(*seen.lock().unwrap(), vec![42]);
        assert!(registry.is_empty());
        // the handle in the registry entry was cancelled on detach
        assert_eq!(child.signal.subscriber_count(), 0);
    }

    #[test]
    fn test_duplicate_emission_runs_continuation_once() {
        let registry = FlowRegistry::new();
        let child = Probe::new(None);
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        registry.coordinate(child.clone(), &child.signal, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        child.signal.emit(1);
        child.signal.emit(1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_synchronous_emit_inside_start_is_observed() {
        let registry = FlowRegistry::new();
        let child = Probe::new(Some(5));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        registry.coordinate(child.clone(), &child.signal, move |v| {
            sink.lock().unwrap().push(v)
        });

        // the child finished before coordinate() returned
        assert_eq!(*seen.lock().unwrap(), vec![5]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_detach_absent_child_is_noop() {
        let registry = FlowRegistry::new();
        registry.detach(Uuid::new_v4());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_cancels_and_recurses() {
        let registry = FlowRegistry::new();
        let a = Probe::new(None);
        let b = Probe::new(None);
        registry.coordinate(a.clone(), &a.signal, |_| {});
        registry.coordinate(b.clone(), &b.signal, |_| {});

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(a.signal.subscriber_count(), 0);
        assert_eq!(b.signal.subscriber_count(), 0);
        assert_eq!(a.cleared.load(Ordering::SeqCst), 1);
        assert_eq!(b.cleared.load(Ordering::SeqCst), 1);

        // late emission after teardown goes nowhere
        let count_before = a.cleared.load(Ordering::SeqCst);
        a.signal.emit(99);
        assert_eq!(a.cleared.load(Ordering::SeqCst), count_before);

        // second clear observes the same empty state
        registry.clear();
        assert!(registry.is_empty());
    }
}
