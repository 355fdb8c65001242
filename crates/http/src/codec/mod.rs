//! HTTP codec module for encoding requests and decoding responses
//!
//! # Architecture
//!
//! - Request handling:
//!   - [`RequestEncoder`]: Encodes outgoing HTTP requests
//!   - Request line and header encoding via the `header` module
//!   - Fixed-length body encoding via the `body` module
//!
//! - Response handling:
//!   - [`ResponseDecoder`]: Decodes incoming HTTP responses
//!   - Status line and header parsing via the `header` module
//!   - Length, chunked and close-delimited body decoding via the `body` module
//!
//! # Example
//!
//! ```no_run
//! use bytes::BytesMut;
//! use http::Method;
//! use restline_http::codec::ResponseDecoder;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = ResponseDecoder::new();
//! decoder.expect_response_to(&Method::GET);
//!
//! let mut buffer = BytesMut::from(&b"HTTP/1.1 204 No Content\r\n\r\n"[..]);
//! let head = decoder.decode(&mut buffer);
//! ```

mod body;
mod header;
mod request_encoder;
mod response_decoder;

pub use request_encoder::RequestEncoder;
pub use response_decoder::ResponseDecoder;
