// src/root.rs

use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bridge::{BridgeSubscription, EventBridge, FlowTrigger, FLOW_TRIGGER};
use crate::flows::login::{LoginFlow, LoginResult};
use crate::flows::main_tab::{MainFlow, MainResult};
use crate::flows::tracking::TrackingFlow;
use crate::flows::GoalKind;
use crate::registry::FlowRegistry;
use crate::services::LocationService;
use crate::surface::Surface;
use crate::unit::{FlowUnit, StartGate};

/// Which top-level flow is active. Exactly one at a time; the previous
/// subtree is torn down before the next state is entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootState {
    Uninitialized,
    LoginFlow,
    MainFlow,
    AdHocFlow(GoalKind),
}

/// The top-level flow unit. Owns the presentation surface for its whole
/// lifetime, switches between the top-level flows, and listens on the
/// event bridge so distant code can force a flow switch without a
/// reference to the tree.
pub struct RootCoordinator {
    identity: Uuid,
    me: Weak<RootCoordinator>,
    surface: Arc<dyn Surface>,
    locations: Arc<LocationService>,
    registry: FlowRegistry,
    state: Mutex<RootState>,
    active_login: Mutex<Weak<LoginFlow>>,
    active_main: Mutex<Weak<MainFlow>>,
    active_tracking: Mutex<Weak<TrackingFlow>>,
    // held for the coordinator's entire life; clear() never touches it
    bridge_subscription: BridgeSubscription,
    gate: StartGate,
}

impl RootCoordinator {
    pub fn new(
        surface: Arc<dyn Surface>,
        bridge: &EventBridge,
        locations: Arc<LocationService>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<Self>| {
            let weak = me.clone();
            let bridge_subscription = bridge.subscribe(FLOW_TRIGGER, move |payload| {
                let Some(root) = weak.upgrade() else { return };
                root.on_flow_trigger(payload);
            });

            Self {
                identity: Uuid::new_v4(),
                me: me.clone(),
                surface,
                locations,
                registry: FlowRegistry::new(),
                state: Mutex::new(RootState::Uninitialized),
                active_login: Mutex::new(Weak::new()),
                active_main: Mutex::new(Weak::new()),
                active_tracking: Mutex::new(Weak::new()),
                bridge_subscription,
                gate: StartGate::new(),
            }
        })
    }

    pub fn state(&self) -> RootState {
        self.state.lock().unwrap().clone()
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    pub fn login_flow(&self) -> Option<Arc<LoginFlow>> {
        self.active_login.lock().unwrap().upgrade()
    }

    pub fn main_flow(&self) -> Option<Arc<MainFlow>> {
        self.active_main.lock().unwrap().upgrade()
    }

    pub fn tracking_flow(&self) -> Option<Arc<TrackingFlow>> {
        self.active_tracking.lock().unwrap().upgrade()
    }

    /// Enter the login flow, tearing down whatever was active.
    pub fn show_login_flow(&self) {
        self.clear();
        *self.state.lock().unwrap() = RootState::LoginFlow;

        let login = LoginFlow::new(self.surface.clone());
        *self.active_login.lock().unwrap() = Arc::downgrade(&login);

        let me = self.me.clone();
        self.registry
            .coordinate(login.clone(), login.close_signal(), move |result| {
                let Some(root) = me.upgrade() else { return };
                match result {
                    LoginResult::LoggedIn => root.show_main_flow(),
                    // no session, so the wall goes straight back up
                    LoginResult::Dismissed => root.show_login_flow(),
                }
            });
        info!("entered login flow");
    }

    /// Enter the main flow, tearing down whatever was active.
    pub fn show_main_flow(&self) {
        self.clear();
        *self.state.lock().unwrap() = RootState::MainFlow;

        let main = MainFlow::new(self.surface.clone());
        *self.active_main.lock().unwrap() = Arc::downgrade(&main);

        let me = self.me.clone();
        self.registry
            .coordinate(main.clone(), main.close_signal(), move |result| {
                let Some(root) = me.upgrade() else { return };
                match result {
                    MainResult::LoggedOut => root.show_login_flow(),
                }
            });
        info!("entered main flow");
    }

    /// Enter the ad-hoc tracking flow for `kind`, tearing down whatever was
    /// active. Pending child results die with their cancelled handles.
    pub fn show_tracking_flow(&self, kind: GoalKind) {
        self.clear();
        *self.state.lock().unwrap() = RootState::AdHocFlow(kind);

        let tracking =
            TrackingFlow::new(self.surface.clone(), kind, self.locations.clone());
        *self.active_tracking.lock().unwrap() = Arc::downgrade(&tracking);

        let me = self.me.clone();
        self.registry
            .coordinate(tracking.clone(), tracking.close_signal(), move |result| {
                let Some(root) = me.upgrade() else { return };
                info!(samples = result.samples, "tracking run ended, back to main");
                root.show_main_flow();
            });
        info!(kind = kind.label(), "entered tracking flow");
    }

    fn on_flow_trigger(&self, payload: &Value) {
        let trigger: FlowTrigger = match serde_json::from_value(payload.clone()) {
            Ok(trigger) => trigger,
            Err(_) => {
                debug!("malformed flow trigger ignored");
                return;
            }
        };
        let Some(kind) = trigger.flow_kind.as_deref().and_then(GoalKind::parse) else {
            debug!(flow_kind = ?trigger.flow_kind, "unrecognized flow trigger ignored");
            return;
        };
        self.show_tracking_flow(kind);
    }

    pub fn is_bridge_subscription_live(&self) -> bool {
        !self.bridge_subscription.is_cancelled()
    }
}

impl FlowUnit for RootCoordinator {
    fn identity(&self) -> Uuid {
        self.identity
    }

    /// The application always begins in the main flow; no prior session is
    /// consulted.
    fn start(&self) {
        self.gate.arm("RootCoordinator");
        self.show_main_flow();
    }

    fn clear(&self) {
        self.registry.clear();
        self.surface.remove_all();
        *self.active_login.lock().unwrap() = Weak::new();
        *self.active_main.lock().unwrap() = Weak::new();
        *self.active_tracking.lock().unwrap() = Weak::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;

    fn make_root() -> (Arc<RootCoordinator>, Arc<RecordingSurface>, Arc<EventBridge>) {
        let surface = Arc::new(RecordingSurface::new());
        let bridge = EventBridge::new();
        let locations = LocationService::new();
        let root = RootCoordinator::new(surface.clone(), &bridge, locations);
        (root, surface, bridge)
    }

    #[tokio::test]
    async fn test_start_enters_main_flow() {
        let (root, surface, bridge) = make_root();
        assert_eq!(root.state(), RootState::Uninitialized);

        root.start();
        assert_eq!(root.state(), RootState::MainFlow);
        assert_eq!(root.registry().len(), 1);
        assert_eq!(surface.depth(), 3);
        bridge.shutdown();
    }

    #[tokio::test]
    async fn test_login_leads_back_to_main() {
        let (root, _surface, bridge) = make_root();
        root.start();

        root.show_login_flow();
        assert_eq!(root.state(), RootState::LoginFlow);

        let login = root.login_flow().unwrap();
        login.complete(LoginResult::LoggedIn);
        assert_eq!(root.state(), RootState::MainFlow);
        assert!(root.login_flow().is_none());
        bridge.shutdown();
    }

    #[tokio::test]
    async fn test_dismissed_login_represents_the_wall() {
        let (root, _surface, bridge) = make_root();
        root.start();
        root.show_login_flow();

        let first = root.login_flow().unwrap();
        first.complete(LoginResult::Dismissed);

        assert_eq!(root.state(), RootState::LoginFlow);
        let second = root.login_flow().unwrap();
        assert_ne!(first.identity(), second.identity());
        bridge.shutdown();
    }

    #[tokio::test]
    async fn test_clear_keeps_bridge_subscription() {
        let (root, surface, bridge) = make_root();
        root.start();

        root.clear();
        root.clear();
        assert!(root.registry().is_empty());
        assert_eq!(surface.depth(), 0);
        assert!(root.is_bridge_subscription_live());
        assert_eq!(bridge.subscriber_count(FLOW_TRIGGER), 1);
        bridge.shutdown();
    }

    #[tokio::test]
    async fn test_tracking_run_returns_to_main() {
        let (root, _surface, bridge) = make_root();
        root.start();

        root.show_tracking_flow(GoalKind::Speed);
        assert_eq!(root.state(), RootState::AdHocFlow(GoalKind::Speed));

        let tracking = root.tracking_flow().unwrap();
        tracking.finish();
        assert_eq!(root.state(), RootState::MainFlow);
        assert!(root.tracking_flow().is_none());
        bridge.shutdown();
    }
}
