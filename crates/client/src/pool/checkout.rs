use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Sleep;
use tracing::debug;

use crate::pool::{Connection, Pool};
use crate::protocol::Origin;
use crate::{Error, Operation};

/// A pending connection reservation, returned by [`Pool::checkout`].
///
/// The reservation is held from the moment the checkout is created. Dropping a checkout
/// before it resolves leaves the wait queue and gives back any connection reserved for it.
pub struct Checkout {
    pool: Pool,
    state: State,
}

enum State {
    Ready(Option<Connection>),
    Queued(Queued),
    Done,
}

struct Queued {
    waiter_id: u64,
    origin: Origin,
    receiver: oneshot::Receiver<Connection>,
    timeout: Duration,
    /// Armed on first poll
    sleep: Option<Pin<Box<Sleep>>>,
}

impl Checkout {
    pub(crate) fn ready(pool: Pool, connection: Connection) -> Self {
        Self { pool, state: State::Ready(Some(connection)) }
    }

    pub(crate) fn queued(pool: Pool, waiter_id: u64, origin: Origin, receiver: oneshot::Receiver<Connection>, timeout: Duration) -> Self {
        Self { pool, state: State::Queued(Queued { waiter_id, origin, receiver, timeout, sleep: None }) }
    }

    /// Whether the reservation had to wait in the queue.
    pub fn is_queued(&self) -> bool {
        matches!(self.state, State::Queued(_))
    }
}

impl Future for Checkout {
    type Output = Result<Connection, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let queued = match &mut this.state {
            State::Ready(connection) => {
                let result = connection.take().ok_or_else(|| Error::task("checkout polled after completion"));
                this.state = State::Done;
                return Poll::Ready(result);
            }
            State::Queued(queued) => queued,
            State::Done => return Poll::Ready(Err(Error::task("checkout polled after completion"))),
        };

        if let Poll::Ready(result) = Pin::new(&mut queued.receiver).poll(cx) {
            this.state = State::Done;
            return Poll::Ready(result.map_err(|_| Error::Closed));
        }

        let timeout = queued.timeout;
        // sleep clamps durations past the timer range instead of overflowing
        let sleep = queued.sleep.get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
        ready!(sleep.as_mut().poll(cx));

        this.pool.withdraw(queued.waiter_id);
        // a connection may have been delivered right before the waiter left the queue
        let result = match queued.receiver.try_recv() {
            Ok(connection) => Ok(connection),
            Err(_) => {
                debug!(origin = %queued.origin, ?timeout, "checkout timed out");
                Err(Error::timeout(Operation::Checkout { origin: queued.origin.clone() }))
            }
        };
        this.state = State::Done;
        Poll::Ready(result)
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        match std::mem::replace(&mut self.state, State::Done) {
            State::Ready(Some(connection)) => self.pool.release(connection),
            State::Queued(mut queued) => {
                self.pool.withdraw(queued.waiter_id);
                queued.receiver.close();
                if let Ok(connection) = queued.receiver.try_recv() {
                    debug!(id = connection.id(), origin = %queued.origin, "checkout dropped, give connection back");
                    self.pool.release(connection);
                }
            }
            State::Ready(None) | State::Done => {}
        }
    }
}

impl fmt::Debug for Checkout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Ready(_) => "ready",
            State::Queued(_) => "queued",
            State::Done => "done",
        };
        f.debug_struct("Checkout").field("state", &state).finish()
    }
}
