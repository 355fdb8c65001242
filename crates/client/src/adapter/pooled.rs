use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{error, trace};

use crate::adapter::Adapter;
use crate::adapter::worker::{self, Job};
use crate::pool::{Pool, PoolStats};
use crate::protocol::{Request, Response};
use crate::transport::{Http1Transport, Transport};
use crate::{Config, Error, Promise};

/// An [`Adapter`] multiplexing requests over a connection [`Pool`].
///
/// Dropping the adapter stops its worker after the requests in flight are done.
pub struct PooledAdapter {
    sender: Option<mpsc::UnboundedSender<Job>>,
    worker: Option<JoinHandle<()>>,
    pool: Pool,
}

impl PooledAdapter {
    /// Creates an adapter speaking HTTP/1.1 over plain TCP.
    ///
    /// # Errors
    ///
    /// Fails if the worker thread or its runtime can't be started.
    pub fn new(config: Config) -> io::Result<Self> {
        Self::with_transport(config, Arc::new(Http1Transport::new()))
    }

    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> io::Result<Self> {
        let pool = Pool::new(config);
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = worker::spawn(pool.clone(), transport, receiver)?;

        Ok(Self { sender: Some(sender), worker: Some(worker), pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl Adapter for PooledAdapter {
    fn execute(&self, request: Arc<Request>) -> Promise<Response> {
        let (promise, writer) = Promise::create();
        trace!(%request, "enqueue request");

        match &self.sender {
            Some(sender) => {
                if let Err(mpsc::error::SendError(job)) = sender.send(Job { request, writer }) {
                    job.writer.reject(Error::Closed);
                }
            }
            None => {
                writer.reject(Error::Closed);
            }
        }
        promise
    }
}

impl Drop for PooledAdapter {
    fn drop(&mut self) {
        // closing the channel lets the worker drain and exit
        self.sender.take();

        if let Some(worker) = self.worker.take()
            && worker.thread().id() != thread::current().id()
            && worker.join().is_err()
        {
            error!("adapter worker panicked");
        }
    }
}

impl fmt::Debug for PooledAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledAdapter").field("running", &self.sender.is_some()).field("pool", &self.pool).finish()
    }
}
