//! Shared state behind a promise and its writer.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::task::Waker;
use std::thread;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{error, trace};

use crate::Error;

/// Observable lifecycle state of a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Processing,
    Fulfilled,
    Rejected,
}

/// Deferred computation of a promise, run at most once with the deadline of its trigger.
pub(crate) type Task<T> = Box<dyn FnOnce(Instant) -> Result<T, Error> + Send>;

enum State<T> {
    Pending,
    Processing,
    Fulfilled(T),
    Rejected(Error),
}

struct Inner<T> {
    state: State<T>,
    task: Option<Task<T>>,
    wakers: Vec<Waker>,
}

pub(crate) struct Cell<T> {
    inner: Mutex<Inner<T>>,
    completed: Condvar,
}

impl<T> Cell<T> {
    pub(crate) fn new(task: Option<Task<T>>) -> Self {
        Self { inner: Mutex::new(Inner { state: State::Pending, task, wakers: Vec::new() }), completed: Condvar::new() }
    }

    pub(crate) fn settled(result: Result<T, Error>) -> Self {
        let state = match result {
            Ok(value) => State::Fulfilled(value),
            Err(error) => State::Rejected(error),
        };
        Self { inner: Mutex::new(Inner { state, task: None, wakers: Vec::new() }), completed: Condvar::new() }
    }

    pub(crate) fn state(&self) -> PromiseState {
        match self.inner.lock().state {
            State::Pending => PromiseState::Pending,
            State::Processing => PromiseState::Processing,
            State::Fulfilled(_) => PromiseState::Fulfilled,
            State::Rejected(_) => PromiseState::Rejected,
        }
    }

    /// Moves the cell into its terminal state, first write wins.
    ///
    /// Returns `false` when the cell was already terminal.
    pub(crate) fn complete(&self, result: Result<T, Error>) -> bool {
        let wakers = {
            let mut inner = self.inner.lock();
            if matches!(inner.state, State::Fulfilled(_) | State::Rejected(_)) {
                trace!("promise already completed, ignore write");
                return false;
            }

            inner.state = match result {
                Ok(value) => State::Fulfilled(value),
                Err(error) => State::Rejected(error),
            };
            inner.task = None;
            std::mem::take(&mut inner.wakers)
        };

        self.completed.notify_all();
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

impl<T: Clone> Cell<T> {
    /// Returns a copy of the terminal result, `None` while not terminal.
    pub(crate) fn result(&self) -> Option<Result<T, Error>> {
        Self::terminal(&self.inner.lock().state)
    }

    /// Blocks until the cell is terminal or `deadline` passes.
    pub(crate) fn wait_until(&self, deadline: Instant) -> Option<Result<T, Error>> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(result) = Self::terminal(&inner.state) {
                return Some(result);
            }
            if self.completed.wait_until(&mut inner, deadline).timed_out() {
                return Self::terminal(&inner.state);
            }
        }
    }

    /// Returns the terminal result, or registers `waker` to be woken on completion.
    pub(crate) fn poll_result(&self, waker: &Waker) -> Option<Result<T, Error>> {
        let mut inner = self.inner.lock();
        let result = Self::terminal(&inner.state);
        if result.is_none() && !inner.wakers.iter().any(|registered| registered.will_wake(waker)) {
            inner.wakers.push(waker.clone());
        }
        result
    }

    fn terminal(state: &State<T>) -> Option<Result<T, Error>> {
        match state {
            State::Fulfilled(value) => Some(Ok(value.clone())),
            State::Rejected(error) => Some(Err(error.clone())),
            State::Pending | State::Processing => None,
        }
    }
}

impl<T: Send + 'static> Cell<T> {
    /// Starts the task of a pending cell on a background thread.
    ///
    /// Only the caller that moves the cell from `Pending` to `Processing` starts the task,
    /// everyone else just waits for the result.
    pub(crate) fn trigger(self: &Arc<Self>, deadline: Instant) {
        let task = {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, State::Pending) {
                return;
            }
            let Some(task) = inner.task.take() else {
                return;
            };
            inner.state = State::Processing;
            task
        };

        let cell = Arc::clone(self);
        let spawned = thread::Builder::new().name("restline-promise".into()).spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| task(deadline))).unwrap_or_else(|panic| Err(Error::task(panic_reason(&*panic))));
            cell.complete(result);
        });

        if let Err(e) = spawned {
            error!(cause = %e, "can't spawn promise task thread");
            self.complete(Err(Error::task(format!("can't spawn task thread: {e}"))));
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_owned()
    }
}

impl<T> fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell").field("state", &self.state()).finish_non_exhaustive()
    }
}
