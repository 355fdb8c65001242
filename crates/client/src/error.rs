//! Errors surfaced through rejected promises.
//!
//! Every failure of the transport core reaches the caller as the rejection reason of a
//! [`Promise`](crate::Promise). Reasons are shared between all readers of a promise, so
//! [`Error`] is cheap to clone.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::protocol::{Origin, Request};

/// What was running when a [`Error::Timeout`] occurred.
#[derive(Debug, Clone)]
pub enum Operation {
    /// A blocking read of a promise
    Wait,
    /// Waiting in the pool queue for a connection
    Checkout { origin: Origin },
    /// Sending a request and reading its response
    Exchange { request: Arc<Request> },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Wait => f.write_str("waiting for promise"),
            Operation::Checkout { origin } => write!(f, "checking out a connection to {origin}"),
            Operation::Exchange { request } => write!(f, "exchanging {request}"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("timeout while {operation}")]
    Timeout { operation: Operation },

    #[error("network error on {request}: {message}")]
    Network { request: Arc<Request>, message: String },

    #[error("invalid uri {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("promise task failed: {reason}")]
    Task { reason: String },

    #[error("promise writer dropped without resolving")]
    Abandoned,

    #[error("adapter worker is not running")]
    Closed,

    #[error("{0}")]
    Custom(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn timeout(operation: Operation) -> Self {
        Self::Timeout { operation }
    }

    pub fn network<S: ToString>(request: Arc<Request>, message: S) -> Self {
        Self::Network { request, message: message.to_string() }
    }

    pub fn invalid_uri<U: ToString, S: ToString>(uri: U, reason: S) -> Self {
        Self::InvalidUri { uri: uri.to_string(), reason: reason.to_string() }
    }

    pub fn task<S: ToString>(reason: S) -> Self {
        Self::Task { reason: reason.to_string() }
    }

    /// Wraps a caller supplied rejection reason.
    pub fn custom<E: Into<Box<dyn std::error::Error + Send + Sync>>>(error: E) -> Self {
        Self::Custom(Arc::from(error.into()))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network { .. })
    }

    /// The request the error belongs to, if it is tied to one.
    pub fn request(&self) -> Option<&Arc<Request>> {
        match self {
            Error::Network { request, .. } | Error::Timeout { operation: Operation::Exchange { request } } => Some(request),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_operation() {
        let origin = Origin::from_uri(&"http://Example.com/a".parse().unwrap()).unwrap();
        let error = Error::timeout(Operation::Checkout { origin });
        assert_eq!(error.to_string(), "timeout while checking out a connection to http://example.com:80");
        assert!(error.is_timeout());
        assert!(error.request().is_none());
    }

    #[test]
    fn custom_reasons_are_shared() {
        let error = Error::custom("boom");
        let copy = error.clone();

        let (Error::Custom(a), Error::Custom(b)) = (&error, &copy) else { panic!("expect custom errors") };
        assert!(Arc::ptr_eq(a, b));
        assert_eq!(copy.to_string(), "boom");
    }
}
