//! Playback state machine + background run thread.

use crate::{
    lock, CancelToken, ControlError, HoldState, HoldToken, InputBackend, ListenerStop,
    MacroDefinition, RunError, StepExecutor,
};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Runner state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// No run thread exists.
    #[default]
    Idle,
    /// Exactly one run thread exists.
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Running => f.write_str("running"),
        }
    }
}

/// Notifications delivered to the observer hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerEvent {
    StateChanged { old: RunState, new: RunState },
    /// A looping run finished one pass over the macro.
    IterationCompleted { iteration: u64 },
    /// A non-looping run reached the end of the macro.
    Completed,
    /// A step failed and the run was aborted.
    Failed { index: usize, message: String },
    /// A release-all sweep could not release some inputs.
    ReleaseFailures { count: usize },
}

type Observer = Arc<dyn Fn(&RunnerEvent) + Send + Sync>;

/// Handle to the macro runner. Clones share the same runner.
#[derive(Clone)]
pub struct MacroRunner {
    inner: Arc<Inner>,
}

struct Inner {
    definition: MacroDefinition,
    executor: StepExecutor,
    hold: Arc<HoldState>,
    slot: Mutex<Slot>,
    idle: Condvar,
    listener: Mutex<Option<ListenerStop>>,
    observer: Mutex<Option<Observer>>,
    outbox: Mutex<Outbox>,
}

/// Events waiting for delivery, in the order they happened.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<RunnerEvent>,
    /// A thread is currently draining `queue`.
    delivering: bool,
}

#[derive(Default)]
struct Slot {
    state: RunState,
    /// Cancel token of the current run, if any.
    cancel: Option<CancelToken>,
    thread: Option<JoinHandle<()>>,
}

enum Outcome {
    Finished,
    Cancelled,
}

impl MacroRunner {
    pub fn new(definition: MacroDefinition, backend: Arc<dyn InputBackend>) -> Self {
        let hold = Arc::new(HoldState::new(backend.clone()));
        let executor = StepExecutor::new(backend, hold.clone());
        if definition.is_looping() && definition.is_empty() {
            warn!("looping macro has no steps; it will run once and stop");
        }
        Self {
            inner: Arc::new(Inner {
                definition,
                executor,
                hold,
                slot: Mutex::new(Slot::default()),
                idle: Condvar::new(),
                listener: Mutex::new(None),
                observer: Mutex::new(None),
                outbox: Mutex::new(Outbox::default()),
            }),
        }
    }

    /// Install the state-change observer. Replaces any previous one.
    pub fn set_observer(&self, observer: impl Fn(&RunnerEvent) + Send + Sync + 'static) {
        *lock(&self.inner.observer) = Some(Arc::new(observer));
    }

    /// Attach the listener that `request_quit` will stop.
    pub fn attach_listener(&self, listener: ListenerStop) {
        *lock(&self.inner.listener) = Some(listener);
    }

    pub fn state(&self) -> RunState {
        lock(&self.inner.slot).state
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Tokens currently marked as held.
    pub fn held_tokens(&self) -> Vec<HoldToken> {
        self.inner.hold.held()
    }

    pub fn definition(&self) -> &MacroDefinition {
        &self.inner.definition
    }

    /// Begin playback on a new thread. No-op while running.
    pub fn start(&self) {
        if self.spawn_run() {
            self.inner.flush();
        }
    }

    fn spawn_run(&self) -> bool {
        let mut slot = lock(&self.inner.slot);
        if slot.state == RunState::Running {
            debug!("start ignored, already running");
            return false;
        }

        let cancel = CancelToken::new();
        let inner = Arc::clone(&self.inner);
        let run_cancel = cancel.clone();
        // The slot lock is held across the spawn, so the new thread cannot
        // reach its Idle transition before Running is recorded.
        let spawned = thread::Builder::new()
            .name("macro-run".into())
            .spawn(move || inner.run(run_cancel));

        match spawned {
            Ok(handle) => {
                slot.state = RunState::Running;
                slot.cancel = Some(cancel);
                // A previous, already finished thread is simply detached.
                slot.thread = Some(handle);
                // Queued under the slot lock, so observers see transitions
                // in the order they happened.
                self.inner.post(RunnerEvent::StateChanged {
                    old: RunState::Idle,
                    new: RunState::Running,
                });
                info!(
                    steps = self.inner.definition.len(),
                    looping = self.inner.definition.is_looping(),
                    "macro started"
                );
                true
            }
            Err(e) => {
                error!(error = %e, "failed to spawn macro thread");
                false
            }
        }
    }

    /// Signal the current run to stop and release every held input now.
    ///
    /// Does not wait for the run thread to exit. Safe to call in any state.
    pub fn stop(&self) {
        let cancel = lock(&self.inner.slot).cancel.clone();
        if let Some(cancel) = cancel {
            if !cancel.is_cancelled() {
                info!("macro stopping");
            }
            cancel.cancel();
        }
        self.inner.release_all();
    }

    pub fn toggle(&self) {
        if self.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Stop playback and tell the trigger listener to stop delivering events.
    ///
    /// Without an attached listener only the stop happens.
    pub fn request_quit(&self) -> Result<(), ControlError> {
        info!("quit requested");
        self.stop();
        let listener = lock(&self.inner.listener).clone();
        match listener {
            Some(listener) => {
                listener.stop();
                Ok(())
            }
            None => {
                warn!("quit requested but no trigger listener is attached");
                Err(ControlError::NoListener)
            }
        }
    }

    /// Block until the runner is idle. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = lock(&self.inner.slot);
        while slot.state == RunState::Running {
            slot = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.inner
                        .idle
                        .wait_timeout(slot, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .inner
                    .idle
                    .wait(slot)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
        true
    }

    /// Stop and join the run thread.
    pub fn shutdown(&self) {
        self.stop();
        let handle = lock(&self.inner.slot).thread.take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("macro thread panicked");
            }
        }
    }
}

impl Inner {
    /// Body of the run thread.
    fn run(self: Arc<Self>, cancel: CancelToken) {
        let _guard = RunGuard { inner: &self };

        match self.play(&cancel) {
            Ok(Outcome::Finished) => {
                debug!("macro completed");
                self.emit(RunnerEvent::Completed);
            }
            Ok(Outcome::Cancelled) => debug!("macro cancelled"),
            Err((index, e)) => {
                error!(index, error = %e, "macro run aborted");
                self.emit(RunnerEvent::Failed {
                    index,
                    message: e.to_string(),
                });
            }
        }
    }

    fn play(&self, cancel: &CancelToken) -> Result<Outcome, (usize, RunError)> {
        if !self.definition.is_looping() || self.definition.is_empty() {
            return self.play_once(cancel);
        }

        let mut iteration = 0u64;
        while !cancel.is_cancelled() {
            if let Outcome::Cancelled = self.play_once(cancel)? {
                break;
            }
            iteration += 1;
            self.emit(RunnerEvent::IterationCompleted { iteration });
        }
        Ok(Outcome::Cancelled)
    }

    fn play_once(&self, cancel: &CancelToken) -> Result<Outcome, (usize, RunError)> {
        for (index, step) in self.definition.steps().iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(Outcome::Cancelled);
            }
            debug!(index, ?step, "executing step");
            self.executor
                .execute(step, cancel)
                .map_err(|e| (index, e))?;
        }

        if cancel.is_cancelled() {
            Ok(Outcome::Cancelled)
        } else {
            Ok(Outcome::Finished)
        }
    }

    fn release_all(&self) {
        let report = self.hold.release_all();
        if !report.failures.is_empty() {
            self.emit(RunnerEvent::ReleaseFailures {
                count: report.failures.len(),
            });
        }
    }

    fn emit(&self, event: RunnerEvent) {
        self.post(event);
        self.flush();
    }

    /// Queue an event for the next `flush`.
    fn post(&self, event: RunnerEvent) {
        lock(&self.outbox).queue.push_back(event);
    }

    /// Deliver queued events in order, outside every runner lock.
    ///
    /// One thread delivers at a time; events posted meanwhile, including from
    /// inside the observer, are delivered by that thread.
    fn flush(&self) {
        let mut outbox = lock(&self.outbox);
        if outbox.delivering {
            return;
        }
        outbox.delivering = true;
        loop {
            let Some(event) = outbox.queue.pop_front() else {
                outbox.delivering = false;
                return;
            };
            drop(outbox);
            let observer = lock(&self.observer).clone();
            if let Some(observer) = observer {
                observer(&event);
            }
            outbox = lock(&self.outbox);
        }
    }
}

/// Final cleanup of a run: release everything, then go Idle.
///
/// Runs on drop so a panicking step still releases held inputs.
struct RunGuard<'a> {
    inner: &'a Inner,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.inner.release_all();
        {
            let mut slot = lock(&self.inner.slot);
            slot.state = RunState::Idle;
            slot.cancel = None;
            self.inner.post(RunnerEvent::StateChanged {
                old: RunState::Running,
                new: RunState::Idle,
            });
            self.inner.idle.notify_all();
        }
        info!("macro stopped");
        self.inner.flush();
    }
}
