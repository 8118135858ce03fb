//! Input injection implementations.

use crate::{PlatformError, PlatformResult};
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use macrotoggle_core::{BackendError, BackendKind, InputBackend, Key, MouseButton, MoveMode};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Build the backend selected in the configuration.
pub fn create_backend(kind: BackendKind) -> PlatformResult<Arc<dyn InputBackend>> {
    match kind {
        BackendKind::Enigo => {
            let backend = EnigoBackend::new()?;
            info!("Using enigo input backend");
            Ok(Arc::new(backend))
        }
        BackendKind::DryRun => {
            info!("Using dry-run input backend, no input will be injected");
            Ok(Arc::new(NoopBackend))
        }
    }
}

/// Backend that injects nothing and logs what it would have done.
pub struct NoopBackend;

impl InputBackend for NoopBackend {
    fn press_key(&self, key: Key) -> Result<(), BackendError> {
        debug!(%key, "NoopBackend: would press key");
        Ok(())
    }

    fn release_key(&self, key: Key) -> Result<(), BackendError> {
        debug!(%key, "NoopBackend: would release key");
        Ok(())
    }

    fn tap_key(&self, key: Key) -> Result<(), BackendError> {
        debug!(%key, "NoopBackend: would tap key");
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), BackendError> {
        debug!(text, "NoopBackend: would type text");
        Ok(())
    }

    fn press_button(&self, button: MouseButton) -> Result<(), BackendError> {
        debug!(%button, "NoopBackend: would press button");
        Ok(())
    }

    fn release_button(&self, button: MouseButton) -> Result<(), BackendError> {
        debug!(%button, "NoopBackend: would release button");
        Ok(())
    }

    fn click_button(&self, button: MouseButton, count: u32) -> Result<(), BackendError> {
        debug!(%button, count, "NoopBackend: would click");
        Ok(())
    }

    fn move_cursor(&self, mode: MoveMode, x: i32, y: i32) -> Result<(), BackendError> {
        debug!(?mode, x, y, "NoopBackend: would move cursor");
        Ok(())
    }

    fn scroll(&self, dx: i32, dy: i32) -> Result<(), BackendError> {
        debug!(dx, dy, "NoopBackend: would scroll");
        Ok(())
    }
}

/// Real input backend using the `enigo` crate.
pub struct EnigoBackend {
    enigo: Mutex<Enigo>,
}

impl EnigoBackend {
    pub fn new() -> PlatformResult<Self> {
        let settings = Settings::default();
        let enigo = Enigo::new(&settings).map_err(|e| {
            PlatformError::BackendUnavailable(format!("failed to create Enigo: {e}"))
        })?;
        Ok(Self {
            enigo: Mutex::new(enigo),
        })
    }

    fn enigo(&self) -> MutexGuard<'_, Enigo> {
        self.enigo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(&self, key: Key, direction: Direction) -> Result<(), BackendError> {
        let k = key_to_enigo(key)?;
        self.enigo().key(k, direction).map_err(failed)
    }

    fn button(&self, button: MouseButton, direction: Direction) -> Result<(), BackendError> {
        self.enigo()
            .button(mouse_button_to_enigo(button), direction)
            .map_err(failed)
    }
}

impl InputBackend for EnigoBackend {
    fn press_key(&self, key: Key) -> Result<(), BackendError> {
        self.key(key, Direction::Press)
    }

    fn release_key(&self, key: Key) -> Result<(), BackendError> {
        self.key(key, Direction::Release)
    }

    fn tap_key(&self, key: Key) -> Result<(), BackendError> {
        self.key(key, Direction::Click)
    }

    fn type_text(&self, text: &str) -> Result<(), BackendError> {
        if text.is_empty() {
            return Ok(());
        }
        self.enigo().text(text).map_err(failed)
    }

    fn press_button(&self, button: MouseButton) -> Result<(), BackendError> {
        self.button(button, Direction::Press)
    }

    fn release_button(&self, button: MouseButton) -> Result<(), BackendError> {
        self.button(button, Direction::Release)
    }

    fn click_button(&self, button: MouseButton, count: u32) -> Result<(), BackendError> {
        let btn = mouse_button_to_enigo(button);
        let mut enigo = self.enigo();
        for _ in 0..count {
            enigo.button(btn, Direction::Click).map_err(failed)?;
        }
        Ok(())
    }

    fn move_cursor(&self, mode: MoveMode, x: i32, y: i32) -> Result<(), BackendError> {
        let coordinate = match mode {
            MoveMode::Absolute => Coordinate::Abs,
            MoveMode::Relative => Coordinate::Rel,
        };
        self.enigo().move_mouse(x, y, coordinate).map_err(failed)
    }

    /// Positive `dy` scrolls up, positive `dx` scrolls right. enigo scrolls
    /// down for positive vertical lengths, hence the negation.
    fn scroll(&self, dx: i32, dy: i32) -> Result<(), BackendError> {
        let mut enigo = self.enigo();
        if dy != 0 {
            enigo
                .scroll(dy.saturating_neg(), Axis::Vertical)
                .map_err(failed)?;
        }
        if dx != 0 {
            enigo.scroll(dx, Axis::Horizontal).map_err(failed)?;
        }
        Ok(())
    }
}

fn failed(e: enigo::InputError) -> BackendError {
    BackendError::Failed(e.to_string())
}

fn mouse_button_to_enigo(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

/// Map a key identifier to an enigo key.
///
/// enigo 0.3 does not distinguish left and right Alt, and the left variants
/// of Ctrl/Shift are the generic keys.
fn key_to_enigo(key: Key) -> Result<enigo::Key, BackendError> {
    use enigo::Key as E;

    let mapped = match key {
        Key::Char(c) => E::Unicode(c),
        Key::Alt | Key::AltL | Key::AltR => E::Alt,
        Key::Backspace => E::Backspace,
        Key::CapsLock => E::CapsLock,
        Key::Cmd | Key::CmdL | Key::CmdR => E::Meta,
        Key::Ctrl | Key::CtrlL => E::Control,
        Key::CtrlR => E::RControl,
        Key::Delete => E::Delete,
        Key::Down => E::DownArrow,
        Key::End => E::End,
        Key::Enter => E::Return,
        Key::Esc => E::Escape,
        Key::F(n) => match n {
            1 => E::F1,
            2 => E::F2,
            3 => E::F3,
            4 => E::F4,
            5 => E::F5,
            6 => E::F6,
            7 => E::F7,
            8 => E::F8,
            9 => E::F9,
            10 => E::F10,
            11 => E::F11,
            12 => E::F12,
            _ => return Err(BackendError::UnsupportedKey(key)),
        },
        Key::Home => E::Home,
        Key::Insert => E::Insert,
        Key::Left => E::LeftArrow,
        Key::NumLock => E::Numlock,
        Key::PageDown => E::PageDown,
        Key::PageUp => E::PageUp,
        Key::Pause => E::Pause,
        Key::PrintScreen => E::PrintScr,
        Key::Right => E::RightArrow,
        Key::Shift | Key::ShiftL => E::Shift,
        Key::ShiftR => E::RShift,
        Key::Space => E::Space,
        Key::Tab => E::Tab,
        Key::Up => E::UpArrow,
        // Not available in enigo 0.3
        Key::AltGr | Key::Menu | Key::ScrollLock => {
            return Err(BackendError::UnsupportedKey(key))
        }
    };
    Ok(mapped)
}
