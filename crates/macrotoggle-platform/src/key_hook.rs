//! Global key hook feeding the trigger source.
//!
//! `rdev::listen` blocks its thread for the life of the process and cannot
//! be interrupted, so `stop()` only stops forwarding and the thread is left
//! detached.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use macrotoggle_core::{Key, KeyEvent};
use rdev::{listen, Event, EventType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Handle to the running key hook.
pub struct KeyHookHandle {
    event_rx: Receiver<KeyEvent>,
    forwarding: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl KeyHookHandle {
    /// Receiver of key events; disconnects if the hook thread dies.
    pub fn events(&self) -> &Receiver<KeyEvent> {
        &self.event_rx
    }

    /// Stop forwarding events.
    pub fn stop(&self) {
        if self.forwarding.swap(false, Ordering::SeqCst) {
            info!("Key hook stopped");
        }
    }

    /// Check if the hook thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for KeyHookHandle {
    fn drop(&mut self) {
        self.stop();
        // Don't join: the listener never returns.
        let _ = self.thread.take();
    }
}

/// Start capturing global key events.
pub fn start_key_hook() -> KeyHookHandle {
    let (event_tx, event_rx) = bounded(1024);
    let forwarding = Arc::new(AtomicBool::new(true));

    let flag = forwarding.clone();
    let thread = thread::spawn(move || {
        run_hook(event_tx, flag);
    });

    KeyHookHandle {
        event_rx,
        forwarding,
        thread: Some(thread),
    }
}

fn run_hook(event_tx: Sender<KeyEvent>, forwarding: Arc<AtomicBool>) {
    info!("Key hook thread started (rdev)");

    let callback = move |event: Event| {
        if !forwarding.load(Ordering::SeqCst) {
            return;
        }
        let Some(key_event) = translate(&event.event_type) else {
            return;
        };
        match event_tx.try_send(key_event) {
            Ok(()) => {}
            Err(TrySendError::Full(ev)) => warn!(?ev, "Key event dropped, channel full"),
            Err(TrySendError::Disconnected(_)) => forwarding.store(false, Ordering::SeqCst),
        }
    };

    if let Err(error) = listen(callback) {
        error!(?error, "Key hook error");
    }

    info!("Key hook thread exiting");
}

/// Keyboard events only; mouse and unmapped keys yield `None`.
fn translate(event_type: &EventType) -> Option<KeyEvent> {
    match *event_type {
        EventType::KeyPress(key) => map_key(key).map(KeyEvent::Down),
        EventType::KeyRelease(key) => map_key(key).map(KeyEvent::Up),
        _ => None,
    }
}

/// Map an rdev key to a key identifier (physical key, unshifted).
fn map_key(key: rdev::Key) -> Option<Key> {
    use rdev::Key as R;

    let mapped = match key {
        R::Alt => Key::AltL,
        R::AltGr => Key::AltGr,
        R::Backspace => Key::Backspace,
        R::CapsLock => Key::CapsLock,
        R::ControlLeft => Key::CtrlL,
        R::ControlRight => Key::CtrlR,
        R::Delete | R::KpDelete => Key::Delete,
        R::DownArrow => Key::Down,
        R::End => Key::End,
        R::Escape => Key::Esc,
        R::F1 => Key::F(1),
        R::F2 => Key::F(2),
        R::F3 => Key::F(3),
        R::F4 => Key::F(4),
        R::F5 => Key::F(5),
        R::F6 => Key::F(6),
        R::F7 => Key::F(7),
        R::F8 => Key::F(8),
        R::F9 => Key::F(9),
        R::F10 => Key::F(10),
        R::F11 => Key::F(11),
        R::F12 => Key::F(12),
        R::Home => Key::Home,
        R::LeftArrow => Key::Left,
        R::MetaLeft => Key::CmdL,
        R::MetaRight => Key::CmdR,
        R::PageDown => Key::PageDown,
        R::PageUp => Key::PageUp,
        R::Return | R::KpReturn => Key::Enter,
        R::RightArrow => Key::Right,
        R::ShiftLeft => Key::ShiftL,
        R::ShiftRight => Key::ShiftR,
        R::Space => Key::Space,
        R::Tab => Key::Tab,
        R::UpArrow => Key::Up,
        R::PrintScreen => Key::PrintScreen,
        R::ScrollLock => Key::ScrollLock,
        R::Pause => Key::Pause,
        R::NumLock => Key::NumLock,
        R::Insert => Key::Insert,
        R::BackQuote => Key::Char('`'),
        R::Num1 | R::Kp1 => Key::Char('1'),
        R::Num2 | R::Kp2 => Key::Char('2'),
        R::Num3 | R::Kp3 => Key::Char('3'),
        R::Num4 | R::Kp4 => Key::Char('4'),
        R::Num5 | R::Kp5 => Key::Char('5'),
        R::Num6 | R::Kp6 => Key::Char('6'),
        R::Num7 | R::Kp7 => Key::Char('7'),
        R::Num8 | R::Kp8 => Key::Char('8'),
        R::Num9 | R::Kp9 => Key::Char('9'),
        R::Num0 | R::Kp0 => Key::Char('0'),
        R::Minus | R::KpMinus => Key::Char('-'),
        R::Equal => Key::Char('='),
        R::KpPlus => Key::Char('+'),
        R::KpMultiply => Key::Char('*'),
        R::Slash | R::KpDivide => Key::Char('/'),
        R::KeyQ => Key::Char('q'),
        R::KeyW => Key::Char('w'),
        R::KeyE => Key::Char('e'),
        R::KeyR => Key::Char('r'),
        R::KeyT => Key::Char('t'),
        R::KeyY => Key::Char('y'),
        R::KeyU => Key::Char('u'),
        R::KeyI => Key::Char('i'),
        R::KeyO => Key::Char('o'),
        R::KeyP => Key::Char('p'),
        R::LeftBracket => Key::Char('['),
        R::RightBracket => Key::Char(']'),
        R::KeyA => Key::Char('a'),
        R::KeyS => Key::Char('s'),
        R::KeyD => Key::Char('d'),
        R::KeyF => Key::Char('f'),
        R::KeyG => Key::Char('g'),
        R::KeyH => Key::Char('h'),
        R::KeyJ => Key::Char('j'),
        R::KeyK => Key::Char('k'),
        R::KeyL => Key::Char('l'),
        R::SemiColon => Key::Char(';'),
        R::Quote => Key::Char('\''),
        R::BackSlash | R::IntlBackslash => Key::Char('\\'),
        R::KeyZ => Key::Char('z'),
        R::KeyX => Key::Char('x'),
        R::KeyC => Key::Char('c'),
        R::KeyV => Key::Char('v'),
        R::KeyB => Key::Char('b'),
        R::KeyN => Key::Char('n'),
        R::KeyM => Key::Char('m'),
        R::Comma => Key::Char(','),
        R::Dot => Key::Char('.'),
        R::Function | R::Unknown(_) => {
            debug!(?key, "unmapped key ignored");
            return None;
        }
    };
    Some(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_letters_and_digits() {
        assert_eq!(map_key(rdev::Key::KeyH), Some(Key::Char('h')));
        assert_eq!(map_key(rdev::Key::Num7), Some(Key::Char('7')));
        assert_eq!(map_key(rdev::Key::Kp7), Some(Key::Char('7')));
    }

    #[test]
    fn test_map_sided_modifiers() {
        assert_eq!(map_key(rdev::Key::ControlLeft), Some(Key::CtrlL));
        assert_eq!(map_key(rdev::Key::ShiftRight), Some(Key::ShiftR));
        assert_eq!(map_key(rdev::Key::Alt), Some(Key::AltL));
        assert!(map_key(rdev::Key::ControlRight)
            .is_some_and(|k| k.matches(Key::Ctrl)));
    }

    #[test]
    fn test_map_function_keys() {
        assert_eq!(map_key(rdev::Key::F6), Some(Key::F(6)));
        assert_eq!(map_key(rdev::Key::Escape), Some(Key::Esc));
    }

    #[test]
    fn test_unknown_keys_dropped() {
        assert_eq!(map_key(rdev::Key::Unknown(999)), None);
        assert_eq!(map_key(rdev::Key::Function), None);
    }

    fn handle_with(thread: JoinHandle<()>) -> (Sender<KeyEvent>, KeyHookHandle) {
        let (event_tx, event_rx) = bounded(1);
        let handle = KeyHookHandle {
            event_rx,
            forwarding: Arc::new(AtomicBool::new(true)),
            thread: Some(thread),
        };
        (event_tx, handle)
    }

    #[test]
    fn test_is_running_tracks_hook_thread() {
        let (release_tx, release_rx) = bounded::<()>(1);
        let (_tx, handle) = handle_with(thread::spawn(move || {
            let _ = release_rx.recv();
        }));
        assert!(handle.is_running());

        release_tx.send(()).unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while handle.is_running() && std::time::Instant::now() < deadline {
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(!handle.is_running());
    }

    #[test]
    fn test_stop_disables_forwarding() {
        let (_tx, handle) = handle_with(thread::spawn(|| {}));
        handle.stop();
        assert!(!handle.forwarding.load(Ordering::SeqCst));
        handle.stop();
    }

    #[test]
    fn test_translate_ignores_mouse_events() {
        assert_eq!(
            translate(&EventType::KeyPress(rdev::Key::F8)),
            Some(KeyEvent::Down(Key::F(8)))
        );
        assert_eq!(
            translate(&EventType::KeyRelease(rdev::Key::F8)),
            Some(KeyEvent::Up(Key::F(8)))
        );
        assert_eq!(translate(&EventType::MouseMove { x: 1.0, y: 2.0 }), None);
    }
}
