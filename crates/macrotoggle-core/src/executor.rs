//! Step interpreter.

use crate::{
    Action, BackendError, CancelToken, HoldState, HoldToken, InputBackend, Key, RunError, Step,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Executes one [`Step`] at a time against the backend.
///
/// Press steps record their token in the shared [`HoldState`] so that a stop
/// can release it; taps and combos resolve within the step and never touch it.
pub struct StepExecutor {
    backend: Arc<dyn InputBackend>,
    hold: Arc<HoldState>,
}

impl StepExecutor {
    pub fn new(backend: Arc<dyn InputBackend>, hold: Arc<HoldState>) -> Self {
        Self { backend, hold }
    }

    /// Run `step`, honoring `cancel`.
    ///
    /// A cancelled token skips every step other than `Wait` with no side
    /// effects; `Wait` returns as soon as the token is cancelled.
    pub fn execute(&self, step: &Step, cancel: &CancelToken) -> Result<(), RunError> {
        if let Step::Wait { duration } = step {
            if cancel.wait(*duration) {
                debug!(?duration, "wait interrupted");
            }
            return Ok(());
        }

        if cancel.is_cancelled() {
            debug!(step = step.kind(), "cancelled, skipping step");
            return Ok(());
        }

        match step {
            Step::Wait { .. } => {}
            Step::Text { content } => {
                debug!(len = content.chars().count(), "typing text");
                self.backend.type_text(content)?;
            }
            Step::Key { key, action } => {
                debug!(%key, ?action, "key");
                match action {
                    Action::Tap => self.backend.tap_key(*key)?,
                    Action::Press => self.press(HoldToken::Key(*key))?,
                    Action::Release => self.release(HoldToken::Key(*key))?,
                }
            }
            Step::Combo { keys } => self.combo(keys)?,
            Step::MouseClick { button, count } => {
                let count = (*count).max(1);
                debug!(%button, count, "mouse click");
                self.backend.click_button(*button, count)?;
            }
            Step::MouseButton { button, action } => {
                debug!(%button, ?action, "mouse button");
                match action {
                    Action::Tap => self.backend.click_button(*button, 1)?,
                    Action::Press => self.press(HoldToken::Mouse(*button))?,
                    Action::Release => self.release(HoldToken::Mouse(*button))?,
                }
            }
            Step::MouseMove { mode, x, y } => {
                debug!(?mode, x, y, "mouse move");
                self.backend.move_cursor(*mode, *x, *y)?;
            }
            Step::MouseScroll { dx, dy } => {
                debug!(dx, dy, "mouse scroll");
                self.backend.scroll(*dx, *dy)?;
            }
        }

        Ok(())
    }

    /// Press and record a held input.
    ///
    /// The token is marked before the backend call and again after it. A
    /// concurrent `release_all` can then never observe a pressed input that
    /// is missing from the set: if the sweep runs between the first mark and
    /// the press, the second mark restores the token for the run's final
    /// sweep. The cost is at most one redundant release.
    fn press(&self, token: HoldToken) -> Result<(), BackendError> {
        self.hold.mark_down(token);
        let result = match token {
            HoldToken::Key(key) => self.backend.press_key(key),
            HoldToken::Mouse(button) => self.backend.press_button(button),
        };
        match result {
            Ok(()) => {
                self.hold.mark_down(token);
                Ok(())
            }
            Err(e) => {
                self.hold.mark_up(&token);
                Err(e)
            }
        }
    }

    /// A failed release leaves the token marked so the final sweep retries it.
    fn release(&self, token: HoldToken) -> Result<(), BackendError> {
        match token {
            HoldToken::Key(key) => self.backend.release_key(key)?,
            HoldToken::Mouse(button) => self.backend.release_button(button)?,
        }
        self.hold.mark_up(&token);
        Ok(())
    }

    /// Press in order, release in reverse order.
    fn combo(&self, keys: &[Key]) -> Result<(), BackendError> {
        debug!(?keys, "combo");
        for (pressed, key) in keys.iter().enumerate() {
            if let Err(e) = self.backend.press_key(*key) {
                self.unwind_combo(&keys[..pressed]);
                return Err(e);
            }
        }
        for key in keys.iter().rev() {
            self.backend.release_key(*key)?;
        }
        Ok(())
    }

    fn unwind_combo(&self, pressed: &[Key]) {
        for key in pressed.iter().rev() {
            if let Err(e) = self.backend.release_key(*key) {
                warn!(%key, error = %e, "failed to release combo key after error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Call, RecordingBackend};
    use crate::{MouseButton, MoveMode};
    use std::time::{Duration, Instant};

    struct Fixture {
        backend: Arc<RecordingBackend>,
        hold: Arc<HoldState>,
        executor: StepExecutor,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(RecordingBackend::new());
        let hold = Arc::new(HoldState::new(backend.clone()));
        let executor = StepExecutor::new(backend.clone(), hold.clone());
        Fixture {
            backend,
            hold,
            executor,
        }
    }

    fn key(c: char) -> Key {
        Key::Char(c)
    }

    #[test]
    fn test_combo_releases_in_reverse_order() {
        let f = fixture();
        let step = Step::Combo {
            keys: vec![key('a'), key('b'), key('c')],
        };
        f.executor.execute(&step, &CancelToken::new()).unwrap();

        assert_eq!(
            f.backend.calls(),
            vec![
                Call::PressKey(key('a')),
                Call::PressKey(key('b')),
                Call::PressKey(key('c')),
                Call::ReleaseKey(key('c')),
                Call::ReleaseKey(key('b')),
                Call::ReleaseKey(key('a')),
            ]
        );
        assert!(f.hold.is_empty());
    }

    #[test]
    fn test_combo_press_failure_releases_pressed_keys() {
        let f = fixture();
        f.backend.fail_on(Call::PressKey(key('c')));
        let step = Step::Combo {
            keys: vec![Key::CtrlL, Key::ShiftL, key('c')],
        };

        let result = f.executor.execute(&step, &CancelToken::new());

        assert!(matches!(result, Err(RunError::Backend(_))));
        assert_eq!(
            f.backend.calls(),
            vec![
                Call::PressKey(Key::CtrlL),
                Call::PressKey(Key::ShiftL),
                Call::PressKey(key('c')),
                Call::ReleaseKey(Key::ShiftL),
                Call::ReleaseKey(Key::CtrlL),
            ]
        );
    }

    #[test]
    fn test_press_marks_and_release_unmarks() {
        let f = fixture();
        let cancel = CancelToken::new();
        let press = Step::Key {
            key: Key::ShiftL,
            action: Action::Press,
        };
        let release = Step::Key {
            key: Key::ShiftL,
            action: Action::Release,
        };

        f.executor.execute(&press, &cancel).unwrap();
        assert!(f.hold.is_held(&HoldToken::Key(Key::ShiftL)));

        f.executor.execute(&release, &cancel).unwrap();
        assert!(f.hold.is_empty());
        assert_eq!(
            f.backend.calls(),
            vec![Call::PressKey(Key::ShiftL), Call::ReleaseKey(Key::ShiftL)]
        );
    }

    #[test]
    fn test_release_without_press_is_harmless() {
        let f = fixture();
        let step = Step::MouseButton {
            button: MouseButton::Left,
            action: Action::Release,
        };
        f.executor.execute(&step, &CancelToken::new()).unwrap();
        assert_eq!(f.backend.calls(), vec![Call::ReleaseButton(MouseButton::Left)]);
        assert!(f.hold.is_empty());
    }

    #[test]
    fn test_failed_press_is_not_marked() {
        let f = fixture();
        f.backend.fail_on(Call::PressButton(MouseButton::Right));
        let step = Step::MouseButton {
            button: MouseButton::Right,
            action: Action::Press,
        };

        assert!(f.executor.execute(&step, &CancelToken::new()).is_err());
        assert!(f.hold.is_empty());
    }

    #[test]
    fn test_taps_do_not_touch_hold_state() {
        let f = fixture();
        let cancel = CancelToken::new();
        f.executor
            .execute(
                &Step::Key {
                    key: key('x'),
                    action: Action::Tap,
                },
                &cancel,
            )
            .unwrap();
        f.executor
            .execute(
                &Step::MouseButton {
                    button: MouseButton::Left,
                    action: Action::Tap,
                },
                &cancel,
            )
            .unwrap();

        assert!(f.hold.is_empty());
        assert_eq!(
            f.backend.calls(),
            vec![
                Call::TapKey(key('x')),
                Call::ClickButton(MouseButton::Left, 1)
            ]
        );
    }

    #[test]
    fn test_mouse_click_count_is_at_least_one() {
        let f = fixture();
        let cancel = CancelToken::new();
        for count in [0, 3] {
            f.executor
                .execute(
                    &Step::MouseClick {
                        button: MouseButton::Middle,
                        count,
                    },
                    &cancel,
                )
                .unwrap();
        }
        assert_eq!(
            f.backend.calls(),
            vec![
                Call::ClickButton(MouseButton::Middle, 1),
                Call::ClickButton(MouseButton::Middle, 3)
            ]
        );
    }

    #[test]
    fn test_text_move_and_scroll() {
        let f = fixture();
        let cancel = CancelToken::new();
        let steps = [
            Step::Text {
                content: "hello".into(),
            },
            Step::MouseMove {
                mode: MoveMode::Relative,
                x: 10,
                y: -5,
            },
            Step::MouseMove {
                mode: MoveMode::Absolute,
                x: 640,
                y: 360,
            },
            Step::MouseScroll { dx: 0, dy: -3 },
        ];
        for step in &steps {
            f.executor.execute(step, &cancel).unwrap();
        }
        assert_eq!(
            f.backend.calls(),
            vec![
                Call::TypeText("hello".into()),
                Call::MoveCursor(MoveMode::Relative, 10, -5),
                Call::MoveCursor(MoveMode::Absolute, 640, 360),
                Call::Scroll(0, -3),
            ]
        );
    }

    #[test]
    fn test_cancelled_token_skips_steps_entirely() {
        let f = fixture();
        let cancel = CancelToken::new();
        cancel.cancel();
        let steps = [
            Step::Key {
                key: key('a'),
                action: Action::Press,
            },
            Step::Combo {
                keys: vec![Key::Ctrl, key('v')],
            },
            Step::Text {
                content: "nope".into(),
            },
        ];
        for step in &steps {
            f.executor.execute(step, &cancel).unwrap();
        }
        assert!(f.backend.calls().is_empty());
        assert!(f.hold.is_empty());
    }

    #[test]
    fn test_wait_is_cancellable() {
        let f = fixture();
        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        let start = Instant::now();
        f.executor
            .execute(
                &Step::Wait {
                    duration: Duration::from_secs(10),
                },
                &cancel,
            )
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[test]
    fn test_press_survives_concurrent_sweep() {
        let f = fixture();
        f.backend.set_press_delay(Duration::from_millis(100));
        let token = HoldToken::Mouse(MouseButton::Left);

        let hold = f.hold.clone();
        let sweeper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            hold.release_all();
        });

        f.executor
            .execute(
                &Step::MouseButton {
                    button: MouseButton::Left,
                    action: Action::Press,
                },
                &CancelToken::new(),
            )
            .unwrap();
        sweeper.join().unwrap();

        // The sweep ran mid-press; the token is back for the final sweep.
        assert!(f.hold.is_held(&token));
        f.hold.release_all();
        assert_eq!(
            f.backend.calls().last(),
            Some(&Call::ReleaseButton(MouseButton::Left))
        );
    }
}
