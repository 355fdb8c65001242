//! Pooled, promise based HTTP transport core
//!
//! restline turns outbound requests into [`Promise`]s and multiplexes them over a bounded set
//! of reusable connections per origin. It is the layer hypermedia clients build on: body
//! decoding, link relations and caching live above it and only see [`Request`], [`Response`]
//! and [`Promise`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use restline::{Adapter, Config, PooledAdapter, Request};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let adapter = PooledAdapter::new(Config::builder().max_per_origin(2).build()?)?;
//!
//! let user = adapter.execute(Arc::new(Request::get("http://localhost:8080/users/1").build()?));
//! let name = user.then(|response| String::from_utf8_lossy(response.body()).into_owned());
//!
//! println!("{}", name.wait(Some(Duration::from_secs(5)))?);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`promise`]: the future value with chaining, flattening and blocking or async reads
//! - [`pool`]: connections per origin under a global and a per origin cap, with a FIFO queue
//! - [`adapter`]: the background worker performing exchanges, redirects and the single retry
//! - [`transport`]: how connections are opened and exchanges performed, HTTP/1.1 over TCP
//!   by default
//! - [`protocol`]: requests, responses and origins
//!
//! # Limitations
//!
//! - Plain `http` only, `https` origins fail with a network error
//! - HTTP/1.x only
//! - Whole bodies are buffered

pub mod adapter;
pub mod pool;
pub mod promise;
pub mod protocol;
pub mod transport;

mod config;
mod error;

pub use adapter::{Adapter, PooledAdapter};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use error::{Error, Operation};
pub use pool::{Checkout, Connection, Pool, PoolStats};
pub use promise::{Next, Promise, PromiseState, Writer};
pub use protocol::{Origin, Request, RequestBuilder, Response};
pub use transport::{Exchange, Http1Transport, Outcome, Transport, TransportConnection};
