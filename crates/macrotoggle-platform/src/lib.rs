//! macrotoggle-platform: platform-specific I/O boundary for macrotoggle.
//!
//! This crate provides:
//! - Input injection (keyboard/mouse simulation) via `enigo`
//! - A dry-run backend that only logs
//! - A global key hook via `rdev` feeding the trigger source

mod error;
mod injector;
mod key_hook;

pub use error::{PlatformError, PlatformResult};
pub use injector::{create_backend, EnigoBackend, NoopBackend};
pub use key_hook::{start_key_hook, KeyHookHandle};
