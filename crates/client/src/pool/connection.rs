use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::Error;
use crate::protocol::{Origin, Request};
use crate::transport::{Outcome, Transport, TransportConnection};

/// A pooled connection to one origin.
///
/// A connection starts pipelined unless its origin was demoted, and only ever moves from
/// pipelined to serial. A pipelined connection is trusted to be reusable, so a failure on it
/// is taken for a stale keep-alive connection and the request is retried elsewhere.
pub struct Connection {
    id: u64,
    origin: Origin,
    handle: Option<Box<dyn TransportConnection>>,
    in_flight: VecDeque<Arc<Request>>,
    pipeline: bool,
    keep_alive: bool,
    served: u64,
    idle_since: Instant,
}

impl Connection {
    pub(crate) fn new(id: u64, origin: Origin, pipeline: bool) -> Self {
        Self {
            id,
            origin,
            handle: None,
            in_flight: VecDeque::new(),
            pipeline,
            keep_alive: true,
            served: 0,
            idle_since: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn is_pipelined(&self) -> bool {
        self.pipeline
    }

    /// Whether the transport handle has been opened.
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Whether the connection may go back to the pool after use.
    pub fn is_reusable(&self) -> bool {
        self.keep_alive
    }

    /// Number of exchanges performed on this connection.
    pub fn served(&self) -> u64 {
        self.served
    }

    /// Requests currently being exchanged on this connection.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.idle_since.elapsed()
    }

    pub(crate) fn mark_idle(&mut self) {
        self.idle_since = Instant::now();
    }

    /// Switches to serial mode for good.
    pub fn demote(&mut self) {
        if self.pipeline {
            debug!(id = self.id, origin = %self.origin, "connection demoted to serial");
            self.pipeline = false;
        }
    }

    /// Performs one exchange, opening the transport handle first if needed.
    ///
    /// A peer that does not keep the connection alive demotes it and marks it not reusable.
    pub async fn exchange(&mut self, transport: &dyn Transport, request: &Arc<Request>, connect_timeout: Duration) -> Outcome {
        if self.handle.is_none() {
            match tokio::time::timeout(connect_timeout, transport.connect(&self.origin)).await {
                Ok(Ok(handle)) => {
                    trace!(id = self.id, origin = %self.origin, "transport handle opened");
                    self.handle = Some(handle);
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::Unsupported => {
                    return Outcome::Fatal(Error::network(Arc::clone(request), e));
                }
                Ok(Err(e)) => {
                    return Outcome::Retryable(Error::network(Arc::clone(request), format!("can't connect to {}: {e}", self.origin)));
                }
                Err(_elapsed) => {
                    return Outcome::Retryable(Error::network(
                        Arc::clone(request),
                        format!("connect to {} timed out after {connect_timeout:?}", self.origin),
                    ));
                }
            }
        }

        let Some(handle) = self.handle.as_mut() else {
            return Outcome::Fatal(Error::network(Arc::clone(request), "connection has no transport handle"));
        };

        self.in_flight.push_back(Arc::clone(request));
        let outcome = handle.send(request).await;
        self.in_flight.pop_front();
        self.served += 1;

        match &outcome {
            Outcome::Success(exchange) if !exchange.keep_alive => {
                debug!(id = self.id, origin = %self.origin, "peer closes connection after response");
                self.demote();
                self.keep_alive = false;
            }
            Outcome::Success(_) => {}
            Outcome::Retryable(_) | Outcome::Fatal(_) => self.keep_alive = false,
        }
        outcome
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("open", &self.is_open())
            .field("in_flight", &self.in_flight.len())
            .field("pipeline", &self.pipeline)
            .field("keep_alive", &self.keep_alive)
            .field("served", &self.served)
            .finish()
    }
}
