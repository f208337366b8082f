use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// State of the one-shot readiness handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    NotYetRunning,
    /// Terminal. Set at most once.
    Running,
    /// Terminal. The watcher exited without observing readiness.
    Abandoned,
}

/// Result of waiting on the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Ready,
    Abandoned,
    TimedOut,
}

/// One-shot gate releasing the launching thread once the child is ready.
///
/// The watcher thread calls [`signal`](Self::signal) or
/// [`abandon`](Self::abandon); the launching thread blocks in
/// [`wait`](Self::wait). Only the first terminal transition counts.
#[derive(Debug)]
pub struct ReadinessGate {
    state: Mutex<ReadinessState>,
    wake: Condvar,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ReadinessState::NotYetRunning),
            wake: Condvar::new(),
        }
    }

    /// Move to `Running` and wake the waiter. Returns true only for the call
    /// that performed the transition.
    pub fn signal(&self) -> bool {
        self.transition(ReadinessState::Running)
    }

    /// Move to `Abandoned` unless readiness was already observed.
    pub fn abandon(&self) -> bool {
        self.transition(ReadinessState::Abandoned)
    }

    pub fn state(&self) -> ReadinessState {
        *self.lock()
    }

    /// Block until the gate leaves `NotYetRunning`, or until `timeout` elapses.
    /// `None` waits indefinitely.
    pub fn wait(&self, timeout: Option<Duration>) -> GateOutcome {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();
        loop {
            match *state {
                ReadinessState::Running => return GateOutcome::Ready,
                ReadinessState::Abandoned => return GateOutcome::Abandoned,
                ReadinessState::NotYetRunning => {}
            }
            state = match deadline {
                None => self
                    .wake
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner()),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return GateOutcome::TimedOut;
                    }
                    self.wake
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .0
                }
            };
        }
    }

    fn transition(&self, to: ReadinessState) -> bool {
        let mut state = self.lock();
        if *state != ReadinessState::NotYetRunning {
            return false;
        }
        *state = to;
        drop(state);
        self.wake.notify_all();
        true
    }

    fn lock(&self) -> MutexGuard<'_, ReadinessState> {
        // the guarded value is a plain enum, a poisoned lock still holds a valid state
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
