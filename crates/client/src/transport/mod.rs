//! The strategy that opens connections and performs exchanges.
//!
//! The pool and adapter only know the two object safe traits below. [`Http1Transport`] is the
//! bundled plain TCP HTTP/1.1 implementation, tests plug in their own.

mod http1;
pub use http1::Http1Transport;

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};

#[cfg(test)]
use mockall::automock;

use crate::Error;
use crate::protocol::{Origin, Request};

/// Opens transport connections to an origin.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a new connection.
    ///
    /// Errors of kind [`io::ErrorKind::Unsupported`] are treated as fatal, any other error as
    /// a network failure.
    async fn connect(&self, origin: &Origin) -> io::Result<Box<dyn TransportConnection>>;
}

/// An open connection able to perform one exchange at a time.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransportConnection: Send {
    async fn send(&mut self, request: &Arc<Request>) -> Outcome;
}

/// A response as received from the wire.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Whether the peer lets the connection serve further requests
    pub keep_alive: bool,
}

/// Classified result of one exchange.
#[derive(Debug)]
pub enum Outcome {
    Success(Exchange),
    /// The connection failed, the request may succeed on another one
    Retryable(Error),
    /// The request can't succeed on any connection
    Fatal(Error),
}
