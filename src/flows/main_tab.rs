// src/flows/main_tab.rs

use std::sync::{Arc, Mutex, Weak};

use tracing::info;
use uuid::Uuid;

use crate::channel::ResultChannel;
use crate::flows::goal_setup::GoalSetupFlow;
use crate::flows::GoalKind;
use crate::registry::FlowRegistry;
use crate::surface::{Screen, Surface};
use crate::unit::{FlowUnit, StartGate};

/// Outcome of the main flow. It normally runs for the life of the process;
/// logging out is the one way it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainResult {
    LoggedOut,
}

/// Composite tab-bar flow: presents the tab screens and delegates
/// goal editing to a child sheet.
pub struct MainFlow {
    identity: Uuid,
    me: Weak<MainFlow>,
    surface: Arc<dyn Surface>,
    registry: FlowRegistry,
    close_signal: ResultChannel<MainResult>,
    goal_setup: Mutex<Weak<GoalSetupFlow>>,
    last_goal: Mutex<Option<(GoalKind, String)>>,
    gate: StartGate,
}

impl MainFlow {
    pub fn new(surface: Arc<dyn Surface>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            identity: Uuid::new_v4(),
            me: me.clone(),
            surface,
            registry: FlowRegistry::new(),
            close_signal: ResultChannel::new(),
            goal_setup: Mutex::new(Weak::new()),
            last_goal: Mutex::new(None),
            gate: StartGate::new(),
        })
    }

    pub fn close_signal(&self) -> &ResultChannel<MainResult> {
        &self.close_signal
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    /// Present the goal-value sheet for `kind` as a child flow. A sheet
    /// that is already up is detached first; only one is active at a time.
    pub fn open_goal_setup(&self, kind: GoalKind) -> Arc<GoalSetupFlow> {
        if let Some(previous) = self.goal_setup.lock().unwrap().upgrade() {
            self.registry.detach(previous.identity());
        }

        let sheet = GoalSetupFlow::new(self.surface.clone(), kind);
        *self.goal_setup.lock().unwrap() = Arc::downgrade(&sheet);

        let me = self.me.clone();
        self.registry
            .coordinate(sheet.clone(), sheet.close_signal(), move |value| {
                let Some(main) = me.upgrade() else { return };
                *main.goal_setup.lock().unwrap() = Weak::new();
                match value {
                    Some(value) => {
                        info!(kind = kind.label(), %value, "goal updated");
                        *main.last_goal.lock().unwrap() = Some((kind, value));
                    }
                    None => info!(kind = kind.label(), "goal setup dismissed"),
                }
            });
        sheet
    }

    /// The sheet currently up, if any.
    pub fn goal_setup(&self) -> Option<Arc<GoalSetupFlow>> {
        self.goal_setup.lock().unwrap().upgrade()
    }

    pub fn last_goal(&self) -> Option<(GoalKind, String)> {
        self.last_goal.lock().unwrap().clone()
    }

    /// Finish the flow; the parent decides what comes after the session.
    pub fn log_out(&self) {
        info!("main flow logging out");
        self.close_signal.emit(MainResult::LoggedOut);
    }
}

impl FlowUnit for MainFlow {
    fn identity(&self) -> Uuid {
        self.identity
    }

    fn start(&self) {
        self.gate.arm("MainFlow");
        self.surface.set_children(vec![
            Screen::new("home"),
            Screen::new("record"),
            Screen::new("profile"),
        ]);
    }

    fn clear(&self) {
        self.registry.clear();
        self.surface.remove_all();
        *self.goal_setup.lock().unwrap() = Weak::new();
    }
}
