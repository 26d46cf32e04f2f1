use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::foundation::core::Deadline;

/// A worker lifecycle enum with an explicit transition table.
pub trait WorkerState: Copy + Eq + fmt::Debug + Send + 'static {
    /// `true` when moving from `self` to `next` is allowed.
    fn can_transition(self, next: Self) -> bool;

    /// `true` for states the worker never leaves.
    fn is_terminal(self) -> bool;
}

/// Lifecycle of the log, frame-reader and frame-writer threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    /// Configured, thread not spawned.
    Idle,
    /// Thread pumping its stream.
    Running,
    /// Stream ended or failed; thread has returned or is about to.
    Finished,
}

impl WorkerState for ThreadState {
    fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running) | (Self::Idle, Self::Finished) | (Self::Running, Self::Finished)
        )
    }

    fn is_terminal(self) -> bool {
        self == Self::Finished
    }
}

/// Lifecycle of the progress monitor thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    /// Not started (or disabled).
    Idle,
    /// Polling for the progress file to appear.
    WaitingForFile,
    /// Reading report blocks from the file.
    Tailing,
    /// Final drain done.
    Stopped,
}

impl WorkerState for ProgressState {
    fn can_transition(self, next: Self) -> bool {
        use ProgressState::*;
        matches!(
            (self, next),
            (Idle, WaitingForFile)
                | (Idle, Stopped)
                | (WaitingForFile, Tailing)
                | (WaitingForFile, Stopped)
                | (Tailing, Stopped)
        )
    }

    fn is_terminal(self) -> bool {
        self == Self::Stopped
    }
}

/// Shared, waitable state cell. Clones observe the same state.
#[derive(Debug)]
pub struct StateCell<S> {
    inner: Arc<(Mutex<S>, Condvar)>,
}

impl<S> Clone for StateCell<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: WorkerState> StateCell<S> {
    /// Cell holding `initial`.
    pub fn new(initial: S) -> Self {
        Self {
            inner: Arc::new((Mutex::new(initial), Condvar::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state.
    pub fn get(&self) -> S {
        *self.lock()
    }

    /// Move to `next` if the transition table allows it; waiters are woken on success.
    pub fn advance(&self, next: S) -> bool {
        let mut cur = self.lock();
        if !cur.can_transition(next) {
            tracing::trace!(from = ?*cur, to = ?next, "ignored state transition");
            return false;
        }
        tracing::trace!(from = ?*cur, to = ?next, "state transition");
        *cur = next;
        self.inner.1.notify_all();
        true
    }

    /// Block until the state is terminal. Returns `false` when `timeout` expires first.
    pub fn wait_terminal(&self, timeout: Option<Duration>) -> bool {
        let deadline = Deadline::after(timeout);
        let mut cur = self.lock();
        while !cur.is_terminal() {
            match deadline.remaining() {
                None => {
                    cur = self
                        .inner
                        .1
                        .wait(cur)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(left) if left.is_zero() => return false,
                Some(left) => {
                    cur = self
                        .inner
                        .1
                        .wait_timeout(cur, left)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stream/state.rs"]
mod tests;
