// src/flows/goal_setup.rs

use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;
use uuid::Uuid;

use crate::channel::ResultChannel;
use crate::flows::GoalKind;
use crate::surface::{Screen, Surface};
use crate::unit::{FlowUnit, StartGate};

/// Digits-only distance entry up to `99.99`.
static DISTANCE_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}(\.\d{0,2})?$").unwrap());

/// Number-pad state machine behind the goal-value sheet.
///
/// Distance is gated by [`DISTANCE_INPUT`]; time collects at most four
/// digits (no leading zero) displayed as zero-padded `mm:ss`. Speed goals
/// take no numeric input.
#[derive(Debug, Clone)]
pub struct GoalInput {
    kind: GoalKind,
    raw: String,
}

impl GoalInput {
    pub fn new(kind: GoalKind) -> Self {
        Self {
            kind,
            raw: String::new(),
        }
    }

    /// Feed one key from the pad; anything the active kind rejects is
    /// swallowed without changing state.
    pub fn enter(&mut self, key: char) {
        match self.kind {
            GoalKind::Distance => {
                let mut candidate = self.raw.clone();
                candidate.push(key);
                if DISTANCE_INPUT.is_match(&candidate) {
                    self.raw = candidate;
                }
            }
            GoalKind::Time => {
                if !key.is_ascii_digit() {
                    return;
                }
                if self.raw.is_empty() && key == '0' {
                    return;
                }
                if self.raw.len() >= 4 {
                    return;
                }
                self.raw.push(key);
            }
            GoalKind::Speed => {}
        }
    }

    pub fn backspace(&mut self) {
        self.raw.pop();
    }

    /// What the sheet currently shows.
    pub fn display(&self) -> String {
        match self.kind {
            GoalKind::Distance => {
                if self.raw.is_empty() {
                    "0".to_string()
                } else {
                    self.raw.clone()
                }
            }
            GoalKind::Time => {
                let padded = format!("{:0>4}", self.raw);
                format!("{}:{}", &padded[..2], &padded[2..])
            }
            GoalKind::Speed => "0".to_string(),
        }
    }

    /// The value the sheet commits on apply: distance normalized to two
    /// decimals (`00.00` when unparseable), everything else as displayed.
    pub fn applied_value(&self) -> String {
        match self.kind {
            GoalKind::Distance => match self.display().parse::<f32>() {
                Ok(number) => format!("{number:.2}"),
                Err(_) => "00.00".to_string(),
            },
            GoalKind::Time | GoalKind::Speed => self.display(),
        }
    }
}

/// Leaf flow presenting the goal-value entry sheet. Finishes with
/// `Some(applied value)` or `None` when dismissed.
pub struct GoalSetupFlow {
    identity: Uuid,
    surface: Arc<dyn Surface>,
    kind: GoalKind,
    input: Mutex<GoalInput>,
    close_signal: ResultChannel<Option<String>>,
    gate: StartGate,
}

impl GoalSetupFlow {
    pub fn new(surface: Arc<dyn Surface>, kind: GoalKind) -> Arc<Self> {
        Arc::new(Self {
            identity: Uuid::new_v4(),
            surface,
            kind,
            input: Mutex::new(GoalInput::new(kind)),
            close_signal: ResultChannel::new(),
            gate: StartGate::new(),
        })
    }

    pub fn kind(&self) -> GoalKind {
        self.kind
    }

    pub fn close_signal(&self) -> &ResultChannel<Option<String>> {
        &self.close_signal
    }

    pub fn enter(&self, key: char) {
        self.input.lock().unwrap().enter(key);
    }

    pub fn backspace(&self) {
        self.input.lock().unwrap().backspace();
    }

    pub fn display(&self) -> String {
        self.input.lock().unwrap().display()
    }

    /// Commit the entered value and finish.
    pub fn apply(&self) {
        let value = self.input.lock().unwrap().applied_value();
        info!(kind = self.kind.label(), %value, "goal applied");
        self.close_signal.emit(Some(value));
    }

    /// Dismiss the sheet without a value.
    pub fn cancel(&self) {
        self.close_signal.emit(None);
    }
}

impl FlowUnit for GoalSetupFlow {
    fn identity(&self) -> Uuid {
        self.identity
    }

    fn start(&self) {
        self.gate.arm("GoalSetupFlow");
        self.surface
            .push(Screen::with_detail("goal_setup", self.kind.label()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_entry_is_regex_gated() {
        let mut input = GoalInput::new(GoalKind::Distance);
        assert_eq!(input.display(), "0");

        for key in ['1', '2', '.', '3', '4'] {
            input.enter(key);
        }
        assert_eq!(input.display(), "12.34");

        // a third integer digit and a third decimal are both rejected
        input.enter('5');
        assert_eq!(input.display(), "12.34");

        let mut short = GoalInput::new(GoalKind::Distance);
        short.enter('.');
        assert_eq!(short.display(), "0");
        short.enter('9');
        short.enter('9');
        short.enter('9');
        assert_eq!(short.display(), "99");
    }

    #[test]
    fn test_time_entry_pads_and_limits() {
        let mut input = GoalInput::new(GoalKind::Time);
        assert_eq!(input.display(), "00:00");

        input.enter('0');
        assert_eq!(input.display(), "00:00");

        input.enter('1');
        assert_eq!(input.display(), "00:01");

        for key in ['2', '3', '4', '5'] {
            input.enter(key);
        }
        // the fifth digit fell off
        assert_eq!(input.display(), "12:34");
    }

    #[test]
    fn test_backspace() {
        let mut input = GoalInput::new(GoalKind::Time);
        input.enter('1');
        input.enter('2');
        input.backspace();
        assert_eq!(input.display(), "00:01");

        input.backspace();
        input.backspace();
        assert_eq!(input.display(), "00:00");
    }

    #[test]
    fn test_applied_distance_is_normalized() {
        let mut input = GoalInput::new(GoalKind::Distance);
        input.enter('5');
        assert_eq!(input.applied_value(), "5.00");

        let empty = GoalInput::new(GoalKind::Distance);
        assert_eq!(empty.applied_value(), "0.00");
    }

    #[test]
    fn test_flow_emits_applied_value() {
        use crate::surface::RecordingSurface;
        use std::sync::Mutex;

        let surface = Arc::new(RecordingSurface::new());
        let flow = GoalSetupFlow::new(surface.clone(), GoalKind::Distance);
        let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let _sub = flow
            .close_signal()
            .subscribe(move |v| sink.lock().unwrap().push(v));

        flow.start();
        assert_eq!(surface.stack()[0].detail(), Some("distance"));

        flow.enter('3');
        flow.apply();
        assert_eq!(*seen.lock().unwrap(), vec![Some("3.00".to_string())]);
    }
}
