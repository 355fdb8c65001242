//! Turns requests into promises.
//!
//! # Architecture
//!
//! - [`Adapter`]: the interface the layers above build on
//! - [`PooledAdapter`]: owns a [`Pool`](crate::Pool) and one background worker thread that
//!   performs every exchange, following redirects and retrying once on a failed pipelined
//!   connection
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use restline::{Adapter, Config, PooledAdapter, Request};
//!
//! let adapter = PooledAdapter::new(Config::default()).unwrap();
//! let request = Arc::new(Request::get("http://localhost:8080/users/1").build().unwrap());
//!
//! let response = adapter.execute(request).wait(Some(Duration::from_secs(5))).unwrap();
//! println!("{} {:?}", response.status(), response.body());
//! ```

mod pooled;
mod worker;

pub use pooled::PooledAdapter;

use std::sync::Arc;

use crate::Promise;
use crate::protocol::{Request, Response};

pub trait Adapter: Send + Sync {
    /// Starts `request` and returns the promise of its response.
    ///
    /// Never fails right away, every failure rejects the returned promise. Responses with
    /// error statuses fulfill it like any other response.
    fn execute(&self, request: Arc<Request>) -> Promise<Response>;
}
