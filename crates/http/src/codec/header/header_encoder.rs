//! Request line and header encoder.
//!
//! Serializes a [`RequestHead`] into raw bytes: the request line in origin-form, a `Host`
//! header derived from the URI when the caller did not set one, and the framing header that
//! matches the payload size.

use crate::protocol::{PayloadSize, RequestHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, Version, header};
use std::io;
use std::io::Write;
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Encoder for HTTP request heads implementing the [`Encoder`] trait.
#[derive(Debug, Clone, Copy)]
pub struct HeaderEncoder;

impl Encoder<(RequestHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    /// Encodes the request line and headers into `dst`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - the HTTP version is neither HTTP/1.0 nor HTTP/1.1
    /// - the payload is not of a known length
    /// - the URI authority can't be turned into a `Host` header
    fn encode(&mut self, item: (RequestHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        let version = match head.version() {
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_10 => "HTTP/1.0",
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(SendError::unsupported(format!("http version {v:?}")));
            }
        };

        if !head.headers().contains_key(header::HOST) {
            if let Some(host) = host_value(&head)? {
                head.headers_mut().insert(header::HOST, host);
            }
        }

        match payload_size {
            PayloadSize::Length(n) => {
                head.headers_mut().remove(header::TRANSFER_ENCODING);
                head.headers_mut().insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Empty => {
                head.headers_mut().remove(header::TRANSFER_ENCODING);
                if head.expects_body() {
                    const ZERO_VALUE: HeaderValue = HeaderValue::from_static("0");
                    head.headers_mut().insert(header::CONTENT_LENGTH, ZERO_VALUE);
                } else {
                    head.headers_mut().remove(header::CONTENT_LENGTH);
                }
            }
            size @ (PayloadSize::Chunked | PayloadSize::UntilClose) => {
                error!(payload_size = ?size, "request body must have a known length");
                return Err(SendError::unsupported(format!("request payload {size:?}")));
            }
        }

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {} {}\r\n", head.method().as_str(), head.request_target(), version)?;

        for (header_name, header_value) in head.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Builds `host[:port]` from the request URI, dropping any userinfo.
fn host_value(head: &RequestHead) -> Result<Option<HeaderValue>, SendError> {
    let Some(host) = head.uri().host() else {
        return Ok(None);
    };

    let value = match head.uri().port_u16() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    HeaderValue::from_str(&value).map(Some).map_err(|e| SendError::unsupported(format!("invalid host {value}: {e}")))
}

/// Writes formatted output straight into a `BytesMut`.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
