//! Control events: maps raw key events to toggle/quit on the runner.

use crate::{Key, KeyParseError, MacroRunner, TriggerError};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// A raw key transition reported by the OS hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Down(Key),
    Up(Key),
}

/// What a control event asks the runner to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Toggle,
    Quit,
}

/// A key combination such as `<ctrl>+<alt>+h`.
///
/// Keys are stored canonicalized, so `<ctrl>` matches either control key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    keys: BTreeSet<Key>,
}

impl Hotkey {
    pub fn new(keys: impl IntoIterator<Item = Key>) -> Self {
        Self {
            keys: keys.into_iter().map(Key::canonical).collect(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.keys.iter().copied()
    }

    /// Whether `key` (either side, any case) is part of this hotkey.
    pub fn contains(&self, key: Key) -> bool {
        self.keys.contains(&key.canonical())
    }
}

/// Progress of one hotkey: which of its own keys are currently down.
///
/// Keys outside the hotkey are ignored, so inputs held by the running macro
/// never mask the hotkey.
#[derive(Debug)]
struct ComboWatch {
    hotkey: Hotkey,
    action: ControlAction,
    pressed: BTreeSet<Key>,
}

impl ComboWatch {
    fn new(hotkey: Hotkey, action: ControlAction) -> Self {
        Self {
            hotkey,
            action,
            pressed: BTreeSet::new(),
        }
    }

    /// Returns true when this press completes the hotkey.
    fn press(&mut self, key: Key) -> bool {
        if !self.hotkey.contains(key) {
            return false;
        }
        self.pressed.insert(key.canonical()) && self.pressed.len() == self.hotkey.keys.len()
    }

    fn release(&mut self, key: Key) {
        self.pressed.remove(&key.canonical());
    }
}

impl FromStr for Hotkey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || KeyParseError(s.to_string());
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(err());
        }

        let mut keys = Vec::new();
        for part in split_hotkey(trimmed) {
            let key = match part.strip_prefix('<').and_then(|p| p.strip_suffix('>')) {
                Some(name) if name.chars().count() > 1 => name.parse::<Key>(),
                Some(_) => Err(err()),
                None if part.chars().count() == 1 => part.parse::<Key>(),
                None => Err(err()),
            }
            .map_err(|_| err())?;
            keys.push(key);
        }
        Ok(Hotkey::new(keys))
    }
}

/// Split on `+`, keeping a literal `+` key (`<ctrl>++`).
fn split_hotkey(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'+' && i > start {
            parts.push(&s[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        // Modifiers first, for readability.
        let ordered = self
            .keys
            .iter()
            .filter(|k| k.is_modifier())
            .chain(self.keys.iter().filter(|k| !k.is_modifier()));
        for key in ordered {
            if !first {
                f.write_str("+")?;
            }
            first = false;
            match key {
                Key::Char(c) => write!(f, "{c}")?,
                other => {
                    let name = other.to_string();
                    write!(f, "<{}>", name.trim_start_matches("Key."))?
                }
            }
        }
        Ok(())
    }
}

/// How control events are recognized. Exactly one mode is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerMode {
    /// Global hotkey combinations.
    Combo { toggle: Hotkey, quit: Option<Hotkey> },
    /// A single dedicated key.
    SingleKey { trigger: Key, quit: Option<Key> },
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerMode::Combo { toggle, quit } => {
                write!(f, "trigger_hotkey={toggle}")?;
                match quit {
                    Some(quit) => write!(f, " / quit_hotkey={quit}"),
                    None => f.write_str(" / quit_hotkey=none"),
                }
            }
            TriggerMode::SingleKey { trigger, quit } => {
                write!(f, "trigger_key={trigger}")?;
                match quit {
                    Some(quit) => write!(f, " / quit_key={quit}"),
                    None => f.write_str(" / quit_key=none"),
                }
            }
        }
    }
}

/// Tells a running [`TriggerSource`] to stop listening.
#[derive(Debug, Clone)]
pub struct ListenerStop {
    tx: Sender<()>,
}

impl ListenerStop {
    pub fn stop(&self) {
        // A full channel already holds a pending stop.
        let _ = self.tx.try_send(());
    }
}

/// Listens for control events and drives the runner.
pub struct TriggerSource {
    mode: TriggerMode,
    runner: MacroRunner,
    /// Raw keys currently down, for auto-repeat suppression.
    down: HashSet<Key>,
    /// Per-hotkey progress in combo mode; empty in single-key mode.
    combos: Vec<ComboWatch>,
    stop_tx: Sender<()>,
    stop_rx: Receiver<()>,
}

impl TriggerSource {
    /// Create the source and attach its stop handle to `runner`, so
    /// `request_quit` unblocks [`run`](TriggerSource::run).
    pub fn new(mode: TriggerMode, runner: MacroRunner) -> Self {
        let (stop_tx, stop_rx) = bounded(1);
        runner.attach_listener(ListenerStop {
            tx: stop_tx.clone(),
        });
        let combos = match &mode {
            TriggerMode::Combo { toggle, quit } => {
                let mut combos = vec![ComboWatch::new(toggle.clone(), ControlAction::Toggle)];
                if let Some(quit) = quit {
                    combos.push(ComboWatch::new(quit.clone(), ControlAction::Quit));
                }
                combos
            }
            TriggerMode::SingleKey { .. } => Vec::new(),
        };
        Self {
            mode,
            runner,
            down: HashSet::new(),
            combos,
            stop_tx,
            stop_rx,
        }
    }

    pub fn stop_handle(&self) -> ListenerStop {
        ListenerStop {
            tx: self.stop_tx.clone(),
        }
    }

    pub fn mode(&self) -> &TriggerMode {
        &self.mode
    }

    /// Classify one key event. Repeated downs of a held key yield nothing.
    pub fn handle_event(&mut self, event: KeyEvent) -> Option<ControlAction> {
        let key = match event {
            KeyEvent::Up(key) => {
                self.down.remove(&key);
                for watch in &mut self.combos {
                    watch.release(key);
                }
                return None;
            }
            KeyEvent::Down(key) => key,
        };
        if !self.down.insert(key) {
            return None;
        }

        match &self.mode {
            TriggerMode::SingleKey { trigger, quit } => {
                if key.matches(*trigger) {
                    Some(ControlAction::Toggle)
                } else if quit.is_some_and(|quit| key.matches(quit)) {
                    Some(ControlAction::Quit)
                } else {
                    None
                }
            }
            TriggerMode::Combo { .. } => {
                let mut fired = None;
                for watch in &mut self.combos {
                    if watch.press(key) && fired.is_none() {
                        fired = Some(watch.action);
                    }
                }
                fired
            }
        }
    }

    /// Apply one key event to the runner.
    pub fn dispatch(&mut self, event: KeyEvent) -> Option<ControlAction> {
        let action = self.handle_event(event)?;
        debug!(?event, ?action, "control event");
        match action {
            ControlAction::Toggle => self.runner.toggle(),
            // The runner always has our stop handle attached.
            ControlAction::Quit => {
                let _ = self.runner.request_quit();
            }
        }
        Some(action)
    }

    /// Block, dispatching key events, until told to stop.
    pub fn run(mut self, events: &Receiver<KeyEvent>) -> Result<(), TriggerError> {
        info!(mode = %self.mode, "listening for control keys");
        let stop_rx = self.stop_rx.clone();
        loop {
            select! {
                recv(stop_rx) -> _ => {
                    info!("trigger listener stopped");
                    return Ok(());
                }
                recv(events) -> event => match event {
                    Ok(event) => {
                        self.dispatch(event);
                    }
                    Err(_) => return Err(TriggerError::HookDisconnected),
                },
            }
        }
    }
}
