// src/flows/tracking.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, trace};
use uuid::Uuid;

use crate::channel::{ResultChannel, Subscription};
use crate::flows::GoalKind;
use crate::services::{LocationSample, LocationService};
use crate::surface::{Screen, Surface};
use crate::unit::{FlowUnit, StartGate};

/// Outcome of a tracking run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingResult {
    pub kind: GoalKind,
    pub samples: u64,
}

/// The ad-hoc flow the root enters on an external trigger: a tracking run
/// against one goal kind.
///
/// Holds a live subscription on the location service. Nobody tells a flow
/// unit it was cancelled, so that subscription is released in `clear()`,
/// not in response to any signal.
pub struct TrackingFlow {
    identity: Uuid,
    surface: Arc<dyn Surface>,
    kind: GoalKind,
    locations: Arc<LocationService>,
    samples_seen: Arc<AtomicU64>,
    location_subscription: Mutex<Option<Subscription>>,
    close_signal: ResultChannel<TrackingResult>,
    gate: StartGate,
}

impl TrackingFlow {
    pub fn new(
        surface: Arc<dyn Surface>,
        kind: GoalKind,
        locations: Arc<LocationService>,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity: Uuid::new_v4(),
            surface,
            kind,
            locations,
            samples_seen: Arc::new(AtomicU64::new(0)),
            location_subscription: Mutex::new(None),
            close_signal: ResultChannel::new(),
            gate: StartGate::new(),
        })
    }

    pub fn kind(&self) -> GoalKind {
        self.kind
    }

    pub fn close_signal(&self) -> &ResultChannel<TrackingResult> {
        &self.close_signal
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen.load(Ordering::SeqCst)
    }

    /// Whether the flow currently holds its sensor subscription.
    pub fn is_tracking(&self) -> bool {
        self.location_subscription.lock().unwrap().is_some()
    }

    /// End the run and report what was gathered.
    pub fn finish(&self) {
        self.release_sensor();
        let result = TrackingResult {
            kind: self.kind,
            samples: self.samples_seen(),
        };
        info!(kind = self.kind.label(), samples = result.samples, "tracking run finished");
        self.close_signal.emit(result);
    }

    fn release_sensor(&self) {
        if let Some(subscription) = self.location_subscription.lock().unwrap().take() {
            subscription.cancel();
        }
    }
}

impl FlowUnit for TrackingFlow {
    fn identity(&self) -> Uuid {
        self.identity
    }

    fn start(&self) {
        self.gate.arm("TrackingFlow");
        self.surface
            .push(Screen::with_detail("tracking", self.kind.label()));

        let seen = self.samples_seen.clone();
        let subscription = self.locations.samples().subscribe(move |sample: LocationSample| {
            seen.fetch_add(1, Ordering::SeqCst);
            trace!(
                latitude = sample.latitude,
                longitude = sample.longitude,
                "tracking sample"
            );
        });
        *self.location_subscription.lock().unwrap() = Some(subscription);
    }

    fn clear(&self) {
        self.release_sensor();
    }
}
