//! Test doubles shared by the unit tests.

use crate::{lock, BackendError, InputBackend, Key, MouseButton, MoveMode};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    PressKey(Key),
    ReleaseKey(Key),
    TapKey(Key),
    TypeText(String),
    PressButton(MouseButton),
    ReleaseButton(MouseButton),
    ClickButton(MouseButton, u32),
    MoveCursor(MoveMode, i32, i32),
    Scroll(i32, i32),
}

impl Call {
    pub fn is_press(&self) -> bool {
        matches!(self, Call::PressKey(_) | Call::PressButton(_))
    }
}

/// Backend that records every call instead of touching the OS.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    fail_on: Mutex<Vec<Call>>,
    press_delay: Mutex<Option<Duration>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Make every future call equal to `call` fail (it is still recorded).
    pub fn fail_on(&self, call: Call) {
        lock(&self.fail_on).push(call);
    }

    /// Sleep inside every press call, to widen race windows.
    pub fn set_press_delay(&self, delay: Duration) {
        *lock(&self.press_delay) = Some(delay);
    }

    fn record(&self, call: Call) -> Result<(), BackendError> {
        if call.is_press() {
            let delay = *lock(&self.press_delay);
            if let Some(delay) = delay {
                thread::sleep(delay);
            }
        }
        let fail = lock(&self.fail_on).contains(&call);
        lock(&self.calls).push(call.clone());
        if fail {
            Err(BackendError::Failed(format!("rejected {call:?}")))
        } else {
            Ok(())
        }
    }
}

impl InputBackend for RecordingBackend {
    fn press_key(&self, key: Key) -> Result<(), BackendError> {
        self.record(Call::PressKey(key))
    }

    fn release_key(&self, key: Key) -> Result<(), BackendError> {
        self.record(Call::ReleaseKey(key))
    }

    fn tap_key(&self, key: Key) -> Result<(), BackendError> {
        self.record(Call::TapKey(key))
    }

    fn type_text(&self, text: &str) -> Result<(), BackendError> {
        self.record(Call::TypeText(text.to_string()))
    }

    fn press_button(&self, button: MouseButton) -> Result<(), BackendError> {
        self.record(Call::PressButton(button))
    }

    fn release_button(&self, button: MouseButton) -> Result<(), BackendError> {
        self.record(Call::ReleaseButton(button))
    }

    fn click_button(&self, button: MouseButton, count: u32) -> Result<(), BackendError> {
        self.record(Call::ClickButton(button, count))
    }

    fn move_cursor(&self, mode: MoveMode, x: i32, y: i32) -> Result<(), BackendError> {
        self.record(Call::MoveCursor(mode, x, y))
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<(), BackendError> {
        self.record(Call::Scroll(dx, dy))
    }
}
