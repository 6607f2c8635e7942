// src/surface.rs

use std::sync::Mutex;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One visual frame on the presentation surface. The runtime never renders
/// screens; this is just the value it pushes around on behalf of the units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Screen {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl Screen {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            detail: None,
        }
    }

    pub fn with_detail(name: &str, detail: &str) -> Self {
        Self {
            name: name.to_string(),
            detail: Some(detail.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

/// The shared navigation/display stack every unit in a tree operates on.
///
/// The surface outlives any single flow unit and is mutated sequentially by
/// whichever unit is logically in front; the runtime does not police that
/// beyond the single-coordination-context model.
pub trait Surface: Send + Sync {
    /// Push one screen on top of the stack.
    fn push(&self, screen: Screen);
    /// Replace the whole stack with `screens` (tab-bar style).
    fn set_children(&self, screens: Vec<Screen>);
    /// Discard every screen.
    fn remove_all(&self);
}

/// Surface for the shipped binary: every mutation becomes a log line.
#[derive(Debug, Default)]
pub struct TracingSurface;

impl TracingSurface {
    pub fn new() -> Self {
        Self
    }
}

impl Surface for TracingSurface {
    fn push(&self, screen: Screen) {
        info!(screen = screen.name(), detail = ?screen.detail(), "surface: push");
    }

    fn set_children(&self, screens: Vec<Screen>) {
        let names: Vec<&str> = screens.iter().map(|s| s.name()).collect();
        info!(?names, "surface: set children");
    }

    fn remove_all(&self) {
        info!("surface: remove all");
    }
}

/// Surface that records every mutation and keeps the resulting stack,
/// so tests (ours and embedders') can assert on what a tree displayed.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    stack: Mutex<Vec<Screen>>,
    journal: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// The screens currently on the stack, bottom first.
    pub fn stack(&self) -> Vec<Screen> {
        self.stack.lock().unwrap().clone()
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().unwrap().len()
    }

    /// Every mutation applied so far, in order.
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }
}

impl Surface for RecordingSurface {
    fn push(&self, screen: Screen) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("push {}", screen.name()));
        self.stack.lock().unwrap().push(screen);
    }

    fn set_children(&self, screens: Vec<Screen>) {
        let names: Vec<&str> = screens.iter().map(|s| s.name()).collect();
        self.journal
            .lock()
            .unwrap()
            .push(format!("set_children {}", names.join(",")));
        *self.stack.lock().unwrap() = screens;
    }

    fn remove_all(&self) {
        self.journal.lock().unwrap().push("remove_all".to_string());
        self.stack.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_surface_tracks_stack() {
        let surface = RecordingSurface::new();
        surface.push(Screen::new("login"));
        surface.set_children(vec![Screen::new("home"), Screen::new("profile")]);
        surface.push(Screen::with_detail("tracking", "distance"));

        assert_eq!(surface.depth(), 3);
        assert_eq!(surface.stack()[0].name(), "home");
        assert_eq!(surface.stack()[2].detail(), Some("distance"));

        surface.remove_all();
        assert_eq!(surface.depth(), 0);
        assert_eq!(
            surface.journal(),
            vec![
                "push login",
                "set_children home,profile",
                "push tracking",
                "remove_all"
            ]
        );
    }
}
