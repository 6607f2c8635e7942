// src/flows/login.rs

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::channel::ResultChannel;
use crate::surface::{Screen, Surface};
use crate::unit::{FlowUnit, StartGate};

/// Outcome of the login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginResult {
    LoggedIn,
    Dismissed,
}

/// Leaf flow presenting the login screen. Something outside the runtime
/// (the platform input layer, a test, the demo) calls `complete` when the
/// user is done.
pub struct LoginFlow {
    identity: Uuid,
    surface: Arc<dyn Surface>,
    close_signal: ResultChannel<LoginResult>,
    gate: StartGate,
}

impl LoginFlow {
    pub fn new(surface: Arc<dyn Surface>) -> Arc<Self> {
        Arc::new(Self {
            identity: Uuid::new_v4(),
            surface,
            close_signal: ResultChannel::new(),
            gate: StartGate::new(),
        })
    }

    pub fn close_signal(&self) -> &ResultChannel<LoginResult> {
        &self.close_signal
    }

    /// Finish the flow with `result`. Emitting more than once is a broken
    /// caller; the parent already detached after the first result, so a
    /// second one lands nowhere.
    pub fn complete(&self, result: LoginResult) {
        info!(?result, "login flow finished");
        self.close_signal.emit(result);
    }
}

impl FlowUnit for LoginFlow {
    fn identity(&self) -> Uuid {
        self.identity
    }

    fn start(&self) {
        self.gate.arm("LoginFlow");
        self.surface.push(Screen::new("login"));
    }
}
