//! The input injection capability the engine drives.

use crate::{BackendError, Key, MouseButton, MoveMode};

/// Primitive keyboard/mouse operations against the OS input stack.
///
/// Implemented by `macrotoggle-platform`. Every call may fail; the engine
/// decides whether a failure is fatal (step execution) or swallowed
/// (release-all sweep).
pub trait InputBackend: Send + Sync {
    fn press_key(&self, key: Key) -> Result<(), BackendError>;

    fn release_key(&self, key: Key) -> Result<(), BackendError>;

    /// Press and immediately release.
    fn tap_key(&self, key: Key) -> Result<(), BackendError>;

    fn type_text(&self, text: &str) -> Result<(), BackendError>;

    fn press_button(&self, button: MouseButton) -> Result<(), BackendError>;

    fn release_button(&self, button: MouseButton) -> Result<(), BackendError>;

    /// `count` full press+release cycles.
    fn click_button(&self, button: MouseButton, count: u32) -> Result<(), BackendError>;

    fn move_cursor(&self, mode: MoveMode, x: i32, y: i32) -> Result<(), BackendError>;

    /// Backends without horizontal scrolling may ignore `dx`.
    fn scroll(&self, dx: i32, dy: i32) -> Result<(), BackendError>;
}
