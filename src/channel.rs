// src/channel.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// a subscriber gets every value emitted after it subscribed
type Handler<R> = Arc<dyn Fn(R) + Send + Sync>;

/// Typed multicast emitter that carries a flow unit's outcome to whoever
/// started it. Not a latest-value cache: subscribing after an emission does
/// not replay it. The coordination protocol always subscribes *before*
/// starting the child, so nothing is missed in practice.
///
/// A well-behaved flow unit emits once; the channel itself tolerates
/// repeated emissions and emissions into the void (zero subscribers).
pub struct ResultChannel<R> {
    inner: Arc<ChannelInner<R>>,
}

struct ChannelInner<R> {
    subscribers: Mutex<HashMap<u64, Handler<R>>>,
    next_id: AtomicU64,
}

impl<R> ResultChannel<R> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register `handler` for future emissions. The returned handle is the
    /// only way to sever the subscription; dropping it changes nothing.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(R) + Send + Sync + 'static,
        R: Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap()
            .insert(id, Arc::new(handler));
        let erased: Arc<dyn Revoke + Send + Sync> = self.inner.clone();
        let channel: Weak<dyn Revoke + Send + Sync> = Arc::downgrade(&erased);
        Subscription {
            id,
            channel,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Deliver a clone of `value` to every live subscriber, in subscription
    /// order. Never blocks; zero subscribers is not an error.
    pub fn emit(&self, value: R)
    where
        R: Clone,
    {
        // snapshot under the lock, dispatch outside it so handlers can
        // subscribe/cancel on this same channel
        let mut snapshot: Vec<(u64, Handler<R>)> = {
            let subscribers = self.inner.subscribers.lock().unwrap();
            subscribers.iter().map(|(id, h)| (*id, h.clone())).collect()
        };
        snapshot.sort_by_key(|(id, _)| *id);

        for (id, handler) in snapshot {
            // a cancel processed while we were dispatching must win
            let live = self.inner.subscribers.lock().unwrap().contains_key(&id);
            if live {
                handler(value.clone());
            }
        }
    }

    /// Number of live subscriptions. Exposed so owners can observe that
    /// interest in them was released.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().unwrap().len()
    }
}

impl<R> Default for ResultChannel<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased seam so subscriptions to channels of different result types
/// can live in one registry.
trait Revoke {
    fn revoke(&self, id: u64);
}

impl<R> Revoke for ChannelInner<R> {
    fn revoke(&self, id: u64) {
        self.subscribers.lock().unwrap().remove(&id);
    }
}

/// Cancellation handle for one subscription. Clones share the same
/// cancellation state; cancelling any clone cancels them all.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    channel: Weak<dyn Revoke + Send + Sync>,
    cancelled: Arc<AtomicBool>,
}

impl Subscription {
    /// Sever the subscription: the handler will not run again, even for an
    /// emission currently being dispatched. Calling this more than once is
    /// a no-op, as is cancelling after the channel itself is gone.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(channel) = self.channel.upgrade() {
            channel.revoke(self.id);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_without_subscribers_is_ok() {
        let channel: ResultChannel<u32> = ResultChannel::new();
        channel.emit(7);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_sees_every_emission() {
        let channel = ResultChannel::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = channel.subscribe(move |v: u32| sink.lock().unwrap().push(v));

        channel.emit(1);
        channel.emit(2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let channel = ResultChannel::new();
        channel.emit("early".to_string());

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let _sub = channel.subscribe(move |_: String| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);

        channel.emit("late".to_string());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let channel = ResultChannel::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let sub = channel.subscribe(move |_: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sub.cancel();
        sub.cancel();
        channel.emit(1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_cancel_during_dispatch_wins() {
        // first subscriber cancels the second mid-dispatch; the second
        // handler must not run for the same emission
        let channel: ResultChannel<u32> = ResultChannel::new();
        let second_ran = Arc::new(AtomicBool::new(false));

        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_for_first = slot.clone();
        let _first = channel.subscribe(move |_| {
            if let Some(sub) = slot_for_first.lock().unwrap().take() {
                sub.cancel();
            }
        });

        let ran = second_ran.clone();
        let second = channel.subscribe(move |_| {
            ran.store(true, Ordering::SeqCst);
        });
        *slot.lock().unwrap() = Some(second);

        channel.emit(1);
        assert!(!second_ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_clones_share_cancellation() {
        let channel = ResultChannel::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let sub = channel.subscribe(move |_: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let clone = sub.clone();
        clone.cancel();
        assert!(sub.is_cancelled());
        channel.emit(9);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
