// src/services/location.rs

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use crate::channel::ResultChannel;

/// One position fix from the sensor source.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Shared position source the tracking flow subscribes to.
///
/// Lives alongside the coordination tree as an independent service; flow
/// units receive it by injection. There is no platform sensor here — the
/// feeder is a synthetic walker emitting jittered steps, which is all the
/// runtime needs to exercise subscription lifetimes.
pub struct LocationService {
    samples: ResultChannel<LocationSample>,
    feeder: Mutex<Option<JoinHandle<()>>>,
}

impl LocationService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            samples: ResultChannel::new(),
            feeder: Mutex::new(None),
        })
    }

    /// The sample emitter. Multi-fire use of the same channel type the
    /// coordination results travel on.
    pub fn samples(&self) -> &ResultChannel<LocationSample> {
        &self.samples
    }

    /// Emit one sample now. The feeder uses this; tests drive it directly.
    pub fn publish_sample(&self, latitude: f64, longitude: f64) {
        self.samples.emit(LocationSample {
            latitude,
            longitude,
            recorded_at: Utc::now(),
        });
    }

    /// Start the synthetic feeder, replacing a running one. Must run inside
    /// a tokio runtime.
    pub fn start_updates(self: &Arc<Self>, every: Duration) {
        let service = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            let mut latitude = 37.5665;
            let mut longitude = 126.9780;
            loop {
                ticker.tick().await;
                let mut rng = rand::rng();
                latitude += rng.random_range(-0.0005..0.0005);
                longitude += rng.random_range(-0.0005..0.0005);
                service.publish_sample(latitude, longitude);
            }
        });

        if let Some(old) = self.feeder.lock().unwrap().replace(handle) {
            debug!("replacing running location feeder");
            old.abort();
        }
        info!(interval_ms = every.as_millis() as u64, "location feeder started");
    }

    /// Stop the feeder. Stopping an idle service is a no-op.
    pub fn stop_updates(&self) {
        if let Some(handle) = self.feeder.lock().unwrap().take() {
            handle.abort();
            info!("location feeder stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.feeder.lock().unwrap().is_some()
    }
}

static SHARED_SERVICE: OnceLock<Arc<LocationService>> = OnceLock::new();

/// The process-wide instance, for code with no path to the tree. The root
/// coordinator itself gets its service by injection so tests never need
/// this.
pub fn shared() -> Arc<LocationService> {
    SHARED_SERVICE.get_or_init(LocationService::new).clone()
}
