// src/flows/mod.rs

pub mod goal_setup;
pub mod login;
pub mod main_tab;
pub mod tracking;

pub use goal_setup::{GoalInput, GoalSetupFlow};
pub use login::{LoginFlow, LoginResult};
pub use main_tab::{MainFlow, MainResult};
pub use tracking::{TrackingFlow, TrackingResult};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The goal a tracking run is measured against. This is also the `flow_kind`
/// vocabulary of the external flow trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    Distance,
    Time,
    Speed,
}

impl GoalKind {
    /// Case-insensitive trigger-payload parsing. Anything else is an
    /// unrecognized kind and the caller drops the event.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "distance" => Some(GoalKind::Distance),
            "time" => Some(GoalKind::Time),
            "speed" => Some(GoalKind::Speed),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GoalKind::Distance => "distance",
            GoalKind::Time => "time",
            GoalKind::Speed => "speed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_kind_parsing() {
        assert_eq!(GoalKind::parse("distance"), Some(GoalKind::Distance));
        assert_eq!(GoalKind::parse("TIME"), Some(GoalKind::Time));
        assert_eq!(GoalKind::parse("Speed"), Some(GoalKind::Speed));
        assert_eq!(GoalKind::parse("juggling"), None);
        assert_eq!(GoalKind::parse(""), None);
    }
}
