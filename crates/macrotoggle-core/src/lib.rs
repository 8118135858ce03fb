//! macrotoggle-core: macro model + playback engine.
//!
//! Design goal: keep this crate platform-agnostic. Everything that touches the
//! OS input stack goes through [`InputBackend`], implemented in
//! `macrotoggle-platform`.

mod backend;
mod cancel;
mod config;
mod error;
mod executor;
mod hold;
mod key;
mod runner;
mod trigger;

#[cfg(test)]
mod test_support;

pub use backend::InputBackend;
pub use cancel::CancelToken;
pub use config::{
    candidate_config_paths, find_config, BackendKind, MacroConfig, ValidationError,
};
pub use error::{BackendError, ConfigError, ControlError, RunError, TriggerError};
pub use executor::StepExecutor;
pub use hold::{HoldState, HoldToken, ReleaseReport};
pub use key::{Key, KeyParseError};
pub use runner::{MacroRunner, RunState, RunnerEvent};
pub use trigger::{ControlAction, Hotkey, KeyEvent, ListenerStop, TriggerMode, TriggerSource};

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// An ordered, immutable list of steps plus the loop flag.
#[derive(Debug, Clone)]
pub struct MacroDefinition {
    steps: Arc<[Step]>,
    looping: bool,
}

impl MacroDefinition {
    pub fn new(steps: Vec<Step>, looping: bool) -> Self {
        Self {
            steps: steps.into(),
            looping,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// One atomic action of a macro.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Cancellable pause.
    Wait { duration: Duration },
    /// Type literal text.
    Text { content: String },
    /// Tap, press or release a single key.
    Key { key: Key, action: Action },
    /// Press all keys in order, release them in reverse order.
    Combo { keys: Vec<Key> },
    /// Full press+release cycles of a mouse button.
    MouseClick { button: MouseButton, count: u32 },
    /// Tap, press or release a mouse button.
    MouseButton { button: MouseButton, action: Action },
    /// Move the cursor.
    MouseMove { mode: MoveMode, x: i32, y: i32 },
    /// Scroll wheel.
    MouseScroll { dx: i32, dy: i32 },
}

impl Step {
    /// Tag used in configuration documents and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Wait { .. } => "wait",
            Step::Text { .. } => "text",
            Step::Key { .. } => "key",
            Step::Combo { .. } => "combo",
            Step::MouseClick { .. } => "mouse_click",
            Step::MouseButton { .. } => "mouse_button",
            Step::MouseMove { .. } => "mouse_move",
            Step::MouseScroll { .. } => "mouse_scroll",
        }
    }
}

/// What to do with a key or mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Tap,
    Press,
    Release,
}

impl FromStr for Action {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "tap" => Ok(Action::Tap),
            "press" => Ok(Action::Press),
            "release" => Ok(Action::Release),
            other => Err(InvalidValue::new(other, "\"tap\", \"press\" or \"release\"")),
        }
    }
}

/// Cursor move semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveMode {
    /// Offset from the current position.
    Relative,
    /// Screen coordinates.
    Absolute,
}

impl FromStr for MoveMode {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "relative" => Ok(MoveMode::Relative),
            "absolute" => Ok(MoveMode::Absolute),
            other => Err(InvalidValue::new(other, "\"relative\" or \"absolute\"")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    pub fn as_str(self) -> &'static str {
        match self {
            MouseButton::Left => "left",
            MouseButton::Right => "right",
            MouseButton::Middle => "middle",
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MouseButton {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            _ => Err(InvalidValue::new(s, "\"left\", \"right\" or \"middle\"")),
        }
    }
}

/// A value outside its enumerated set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidValue {
    pub value: String,
    pub expected: &'static str,
}

impl InvalidValue {
    fn new(value: &str, expected: &'static str) -> Self {
        Self {
            value: value.to_string(),
            expected,
        }
    }
}

impl fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value {:?}, expected {}", self.value, self.expected)
    }
}

impl std::error::Error for InvalidValue {}

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Cleanup paths (release-all, state reset) must keep working after a panic
/// elsewhere, so poisoning is ignored throughout the crate.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action() {
        assert_eq!("tap".parse::<Action>().unwrap(), Action::Tap);
        assert_eq!(" press ".parse::<Action>().unwrap(), Action::Press);
        assert_eq!("release".parse::<Action>().unwrap(), Action::Release);
        assert!("hold".parse::<Action>().is_err());
    }

    #[test]
    fn test_parse_mode_and_button() {
        assert_eq!("absolute".parse::<MoveMode>().unwrap(), MoveMode::Absolute);
        assert!("diagonal".parse::<MoveMode>().is_err());
        assert_eq!("Middle".parse::<MouseButton>().unwrap(), MouseButton::Middle);
        assert!("x1".parse::<MouseButton>().is_err());
    }

    #[test]
    fn test_definition_is_shared_not_copied() {
        let def = MacroDefinition::new(
            vec![Step::Text {
                content: "hi".into(),
            }],
            true,
        );
        let clone = def.clone();
        assert!(std::ptr::eq(def.steps(), clone.steps()));
        assert!(clone.is_looping());
        assert_eq!(clone.len(), 1);
    }
}
