//! The HTTP/1.1 client wire layer of restline
//!
//! This crate provides a small HTTP/1.1 client connection built on top of tokio. It encodes
//! outbound requests, decodes inbound responses in a streaming fashion and drives one
//! request/response exchange at a time over any split async reader/writer pair.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 responses
//! - Content-Length, chunked and close-delimited response bodies
//! - Informational (1xx) responses are skipped transparently
//! - Keep-alive detection from the `Connection` header and protocol version
//! - Zero-copy header parsing backed by `httparse`
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::Request;
//! use restline_http::connection::ClientConnection;
//! use restline_http::protocol::RequestHead;
//! use tokio::net::TcpStream;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpStream::connect("127.0.0.1:8080").await?;
//! let (reader, writer) = stream.into_split();
//! let mut connection = ClientConnection::new(reader, writer);
//!
//! let head = RequestHead::from(Request::get("http://127.0.0.1:8080/index.html").body(())?);
//! let (response, body): (_, Bytes) = connection.send(head, None).await?;
//!
//! println!("{} ({} bytes, keep-alive: {})", response.status(), body.len(), response.keep_alive());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: the client connection that performs exchanges
//! - [`protocol`]: request/response heads, payload items and errors
//! - [`codec`]: request encoding and response decoding
//!
//! # Limitations
//!
//! - HTTP/1.x only
//! - No TLS support, the connection works on whatever I/O it is given
//! - Request bodies must have a known length
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod codec;
pub mod connection;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
