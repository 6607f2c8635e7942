// src/app.rs

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error, Result};
use tracing::{info, warn};

use crate::bridge::{self, EventBridge};
use crate::config::ConfigStore;
use crate::root::RootCoordinator;
use crate::services::LocationService;
use crate::surface::Surface;
use crate::unit::FlowUnit;

const DEFAULT_LOCATION_INTERVAL_MS: u64 = 1000;

/// Bootstraps waypoint:
///   - brings up the event bridge (and installs it globally)
///   - starts the location service feeder
///   - builds and starts the root coordinator on `surface`
/// Holds everything needed to drive shutdown.
pub struct App {
    bridge: Option<Arc<EventBridge>>,
    locations: Option<Arc<LocationService>>,
    root: Option<Arc<RootCoordinator>>,
}

impl App {
    pub fn new() -> Self {
        Self {
            bridge: None,
            locations: None,
            root: None,
        }
    }

    pub async fn bootstrap(
        &mut self,
        config: &ConfigStore,
        surface: Arc<dyn Surface>,
    ) -> Result<(), Error> {
        // 1) the bridge: distant code publishes through the global handle
        let event_bridge = EventBridge::new();
        if bridge::install_global(event_bridge.clone()).is_err() {
            warn!("global event bridge already installed, keeping the existing one");
        }

        // 2) location service
        let interval_ms = config
            .0
            .get("WAYPOINT_LOCATION_INTERVAL_MS")
            .await
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_LOCATION_INTERVAL_MS);
        let locations = LocationService::new();
        locations.start_updates(Duration::from_millis(interval_ms));

        // 3) the coordination tree
        let root = RootCoordinator::new(surface, &event_bridge, locations.clone());
        root.start();
        info!("root coordinator started");

        self.bridge = Some(event_bridge);
        self.locations = Some(locations);
        self.root = Some(root);
        Ok(())
    }

    pub fn bridge(&self) -> Option<Arc<EventBridge>> {
        self.bridge.clone()
    }

    pub fn root(&self) -> Option<Arc<RootCoordinator>> {
        self.root.clone()
    }

    /// Tear the tree down, stop the feeder, abort the bridge pump.
    pub async fn shutdown(&self) {
        if let Some(root) = self.root.as_ref() {
            root.clear();
        }
        if let Some(locations) = self.locations.as_ref() {
            locations.stop_updates();
        }
        if let Some(event_bridge) = self.bridge.as_ref() {
            event_bridge.shutdown();
        }
        info!("waypoint shut down");
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Called when the user runs `waypoint init`: lay out the root directory.
pub async fn cmd_init(root: PathBuf) -> Result<(), Error> {
    for dir in ["config", "logs", "schemas"] {
        let path = root.join(dir);
        fs::create_dir_all(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
    }

    let env_file = root.join("config").join(".env");
    if !env_file.exists() {
        fs::write(
            &env_file,
            format!("WAYPOINT_LOCATION_INTERVAL_MS={DEFAULT_LOCATION_INTERVAL_MS}\n"),
        )
        .with_context(|| format!("failed to write {}", env_file.display()))?;
    }
    Ok(())
}
