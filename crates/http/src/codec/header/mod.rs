//! Request line encoding and status line decoding.
//!
//! - [`HeaderEncoder`]: writes the request line and header fields of an outbound request
//! - [`HeaderDecoder`]: parses the status line and header fields of an inbound response and
//!   decides how its payload is delimited

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
