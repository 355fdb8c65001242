//! Payload framing for requests and responses
//!
//! # Components
//!
//! ## Decoders
//! - [`PayloadDecoder`]: picks the decoding strategy from the response's [`PayloadSize`](crate::protocol::PayloadSize)
//! - `ChunkedDecoder`: `Transfer-Encoding: chunked` bodies, extensions and trailers are discarded
//! - `LengthDecoder`: `Content-Length` bodies
//!
//! Close-delimited bodies need no decoder of their own, everything read belongs to the body
//! until the peer shuts the connection down.
//!
//! ## Encoders
//! - [`PayloadEncoder`]: writes request bodies of a known length and checks that exactly the
//!   declared number of bytes is sent

mod chunked_decoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
