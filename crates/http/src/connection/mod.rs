//! HTTP/1.1 client connection
//!
//! [`ClientConnection`] drives request/response exchanges over a split reader/writer pair:
//! it encodes the request head and body, then decodes the response head and collects the
//! body until its framing says it is complete.
//!
//! The connection does not decide whether it may be reused. Callers check
//! [`ResponseHead::keep_alive`](crate::protocol::ResponseHead::keep_alive) and whether the
//! response was close-delimited before sending the next request.

mod client_connection;

pub use client_connection::ClientConnection;
