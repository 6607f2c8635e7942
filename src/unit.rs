// src/unit.rs

use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// An independently startable segment of application control flow.
///
/// A flow unit may delegate to child units through a
/// [`FlowRegistry`](crate::registry::FlowRegistry) and yields at most one
/// result over its lifetime, delivered through its
/// [`ResultChannel`](crate::channel::ResultChannel).
pub trait FlowUnit: Send + Sync {
    /// Process-unique identifier, assigned at construction. Used only as a
    /// registry key, never for comparing semantic state.
    fn identity(&self) -> Uuid;

    /// Begin the unit's work. Must be called exactly once; a second call is
    /// a broken flow-unit implementation and panics (see [`StartGate`]).
    fn start(&self);

    /// Recursively release children and owned resources. Idempotent; a unit
    /// is never notified of cancellation any other way, so anything it holds
    /// (timers, sensor subscriptions) must be released here.
    fn clear(&self) {}
}

/// One-shot latch behind every `start()`.
///
/// Arming twice means a parent restarted a live unit instead of building a
/// fresh one. That would corrupt the tree, so it fails loud rather than
/// silently restarting.
pub struct StartGate {
    started: AtomicBool,
}

impl StartGate {
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
        }
    }

    /// Mark the unit as started. Panics with the unit's name if it was
    /// already armed.
    pub fn arm(&self, unit: &str) {
        if self.started.swap(true, Ordering::SeqCst) {
            panic!("flow unit `{unit}` was started twice");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl Default for StartGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_arms_once() {
        let gate = StartGate::new();
        assert!(!gate.is_armed());
        gate.arm("test_unit");
        assert!(gate.is_armed());
    }

    #[test]
    #[should_panic(expected = "started twice")]
    fn test_double_start_is_fatal() {
        let gate = StartGate::new();
        gate.arm("test_unit");
        gate.arm("test_unit");
    }
}
