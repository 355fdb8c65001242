use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use crate::promise::cell::{Cell, PromiseState, Task};
use crate::promise::writer::Writer;
use crate::protocol::DEFAULT_TIMEOUT;
use crate::{Error, Operation};

/// What a promise task produces: a plain value, or another promise whose value is used
/// instead.
#[derive(Debug)]
pub enum Next<T> {
    Value(T),
    Promise(Promise<T>),
}

/// A handle to a value that becomes available later.
///
/// Handles are cheap to clone, every clone observes the same state. Readers receive clones
/// of the value, rejections share the same [`Error`].
pub struct Promise<T> {
    pub(super) cell: Arc<Cell<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self { cell: Arc::clone(&self.cell) }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").field("state", &self.cell.state()).finish()
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Creates a pending promise together with the only writer able to resolve it.
    pub fn create() -> (Promise<T>, Writer<T>) {
        let cell = Arc::new(Cell::new(None));
        let writer = Writer::new(Arc::clone(&cell));
        (Promise { cell }, writer)
    }

    /// Creates a pending promise and hands its writer to `f`.
    pub fn with_writer<F: FnOnce(Writer<T>)>(f: F) -> Promise<T> {
        let (promise, writer) = Self::create();
        f(writer);
        promise
    }

    pub fn fulfilled(value: T) -> Promise<T> {
        Promise { cell: Arc::new(Cell::settled(Ok(value))) }
    }

    pub fn rejected(error: Error) -> Promise<T> {
        Promise { cell: Arc::new(Cell::settled(Err(error))) }
    }

    /// A promise computed by `task` once somebody waits for it.
    pub fn lazy<F>(task: F) -> Promise<T>
    where
        F: FnOnce() -> Result<Next<T>, Error> + Send + 'static,
    {
        Self::join(Vec::<Promise<()>>::new(), move |_| task())
    }

    /// Resolves `task` with the values of all `dependencies`, in order.
    ///
    /// The first rejected dependency rejects the result without running `task`. A task that
    /// returns [`Next::Promise`] is flattened: the result takes the value of that promise.
    pub fn join<D, F>(dependencies: Vec<Promise<D>>, task: F) -> Promise<T>
    where
        D: Clone + Send + 'static,
        F: FnOnce(Vec<D>) -> Result<Next<T>, Error> + Send + 'static,
    {
        let task: Task<T> = Box::new(move |deadline| {
            let values = dependencies.iter().map(|dependency| dependency.wait_until(deadline)).collect::<Result<Vec<_>, _>>()?;

            match task(values)? {
                Next::Value(value) => Ok(value),
                Next::Promise(promise) => promise.wait_until(deadline),
            }
        });

        Promise { cell: Arc::new(Cell::new(Some(task))) }
    }

    /// Collects the values of all `dependencies`, in order.
    pub fn all(dependencies: Vec<Promise<T>>) -> Promise<Vec<T>> {
        Promise::join(dependencies, |values| Ok(Next::Value(values)))
    }

    /// Maps the value with `f` once this promise is fulfilled.
    pub fn then<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Promise::join(vec![self.clone()], move |values| single(values).map(|value| Next::Value(f(value))))
    }

    /// Chains a computation that itself yields a promise, flattening the result.
    pub fn and_then<U, F>(&self, f: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Promise<U> + Send + 'static,
    {
        Promise::join(vec![self.clone()], move |values| single(values).map(|value| Next::Promise(f(value))))
    }

    /// Blocks until the promise is terminal.
    ///
    /// `None` waits [`DEFAULT_TIMEOUT`]. Waiting starts a lazy task, giving up does not
    /// cancel it.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason, or [`Error::Timeout`] with [`Operation::Wait`] when the
    /// promise is still not terminal after `timeout`.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<T, Error> {
        self.wait_until(deadline_after(timeout.unwrap_or(DEFAULT_TIMEOUT)))
    }

    /// Like [`wait`](Self::wait), but maps rejections and timeouts to `None`.
    pub fn value(&self, timeout: Option<Duration>) -> Option<T> {
        self.wait(timeout).ok()
    }

    pub(crate) fn wait_until(&self, deadline: Instant) -> Result<T, Error> {
        self.cell.trigger(deadline);
        self.cell.wait_until(deadline).unwrap_or_else(|| Err(Error::timeout(Operation::Wait)))
    }
}

impl<T> Promise<T> {
    pub fn state(&self) -> PromiseState {
        self.cell.state()
    }

    /// Whether the promise has no result yet, its task may already be running.
    pub fn is_pending(&self) -> bool {
        !self.is_complete()
    }

    pub fn is_fulfilled(&self) -> bool {
        self.state() == PromiseState::Fulfilled
    }

    pub fn is_rejected(&self) -> bool {
        self.state() == PromiseState::Rejected
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state(), PromiseState::Fulfilled | PromiseState::Rejected)
    }
}

impl<T: Clone + Send + 'static> Future for Promise<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.cell.trigger(deadline_after(DEFAULT_TIMEOUT));
        match self.cell.poll_result(cx.waker()) {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }
}

fn single<T>(values: Vec<T>) -> Result<T, Error> {
    values.into_iter().next().ok_or_else(|| Error::task("dependency value is missing"))
}

/// Stand-in deadline for timeouts too large to be represented as an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).or_else(|| now.checked_add(FAR_FUTURE)).unwrap_or(now)
}
