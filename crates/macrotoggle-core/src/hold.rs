//! Held-input tracking and the release-all safety net.

use crate::{lock, BackendError, InputBackend, Key, MouseButton};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// One physically held input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoldToken {
    Key(Key),
    Mouse(MouseButton),
}

impl fmt::Display for HoldToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldToken::Key(key) => write!(f, "key:{key}"),
            HoldToken::Mouse(button) => write!(f, "mouse:{button}"),
        }
    }
}

/// Outcome of a release-all sweep.
#[derive(Debug, Default)]
pub struct ReleaseReport {
    pub released: Vec<HoldToken>,
    pub failures: Vec<(HoldToken, BackendError)>,
}

impl ReleaseReport {
    /// True when the sweep found nothing to release.
    pub fn is_empty(&self) -> bool {
        self.released.is_empty() && self.failures.is_empty()
    }
}

/// Authoritative record of inputs left down by `press` steps.
///
/// Only the set itself is guarded. Backend calls made by [`release_all`]
/// happen after the lock is dropped so a slow backend never blocks
/// `mark_down`/`mark_up` from the executor.
///
/// [`release_all`]: HoldState::release_all
pub struct HoldState {
    backend: Arc<dyn InputBackend>,
    held: Mutex<HashSet<HoldToken>>,
}

impl HoldState {
    pub fn new(backend: Arc<dyn InputBackend>) -> Self {
        Self {
            backend,
            held: Mutex::new(HashSet::new()),
        }
    }

    pub fn mark_down(&self, token: HoldToken) {
        if lock(&self.held).insert(token) {
            debug!(%token, "marked held");
        }
    }

    /// No-op when `token` is not held.
    pub fn mark_up(&self, token: &HoldToken) {
        if lock(&self.held).remove(token) {
            debug!(%token, "marked released");
        }
    }

    /// Empty the held set and release every token it contained.
    ///
    /// Failures are collected per token and logged; they never stop the
    /// sweep. With nothing held, no backend call is made.
    pub fn release_all(&self) -> ReleaseReport {
        let tokens: Vec<HoldToken> = lock(&self.held).drain().collect();

        let mut report = ReleaseReport::default();
        for token in tokens {
            let result = match token {
                HoldToken::Key(key) => self.backend.release_key(key),
                HoldToken::Mouse(button) => self.backend.release_button(button),
            };
            match result {
                Ok(()) => {
                    debug!(%token, "released held input");
                    report.released.push(token);
                }
                Err(e) => {
                    warn!(%token, error = %e, "failed to release held input");
                    report.failures.push((token, e));
                }
            }
        }
        report
    }

    /// Snapshot of currently held tokens.
    pub fn held(&self) -> Vec<HoldToken> {
        lock(&self.held).iter().copied().collect()
    }

    pub fn is_held(&self, token: &HoldToken) -> bool {
        lock(&self.held).contains(token)
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.held).is_empty()
    }
}
