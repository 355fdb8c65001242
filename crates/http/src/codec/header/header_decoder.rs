//! HTTP response head decoder
//!
//! Parses the status line and header fields of a response with `httparse` and decides how
//! the payload that follows is delimited (RFC 9112 section 6.3):
//!
//! 1. responses to HEAD, 1xx, 204 and 304 responses never have a body
//! 2. `Transfer-Encoding` with `chunked` as final coding means chunked framing, any other
//!    transfer coding means the body runs until the connection closes
//! 3. `Content-Length` gives a fixed length
//! 4. otherwise the body runs until the connection closes
//!
//! Header values are sliced out of the frozen head buffer instead of being copied.

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Response, StatusCode, header};
use httparse::{Error, Status};
use tracing::{trace, warn};

use crate::ensure;

use crate::protocol::{ParseError, PayloadSize, ResponseHead};

/// Maximum number of headers allowed in a response
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decoder for HTTP response heads.
///
/// `head_request` must be set when the response answers a HEAD request, since such responses
/// announce a length without carrying a body.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderDecoder {
    head_request: bool,
}

impl HeaderDecoder {
    pub fn new(head_request: bool) -> Self {
        Self { head_request }
    }

    /// Attempts to decode one response head from `src`.
    ///
    /// Returns `Ok(None)` when more data is needed. Informational responses are returned too,
    /// skipping them is up to the caller.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<(ResponseHead, PayloadSize)>, ParseError> {
        // "HTTP/1.1 200 \r\n\r\n" is the shortest head we could accept
        if src.len() < 16 {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut res = httparse::Response::new(&mut headers);

        let parsed_result = res.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        match parsed_result? {
            Status::Complete(body_offset) => {
                trace!(head_size = body_offset, "parsed response head");
                ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

                let header_count = res.headers.len();

                let mut header_index = [HeaderIndex::EMPTY; MAX_HEADER_NUM];
                HeaderIndex::record(src, res.headers, &mut header_index);

                let version = match res.version {
                    Some(0) => http::Version::HTTP_10,
                    Some(1) => http::Version::HTTP_11,
                    _ => return Err(ParseError::InvalidVersion(res.version)),
                };

                let status = res
                    .code
                    .and_then(|code| StatusCode::from_u16(code).ok())
                    .ok_or(ParseError::InvalidStatus(res.code))?;

                let mut builder = Response::builder().status(status).version(version);
                let headers = builder.headers_mut().ok_or_else(|| ParseError::invalid_header("response builder failed"))?;
                headers.reserve(header_count);

                let header_bytes = src.split_to(body_offset).freeze();
                for index in &header_index[..header_count] {
                    let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1]).map_err(ParseError::invalid_header)?;
                    let value = HeaderValue::from_maybe_shared(header_bytes.slice(index.value.0..index.value.1))
                        .map_err(ParseError::invalid_header)?;

                    headers.append(name, value);
                }

                let head = ResponseHead::from(builder.body(()).map_err(ParseError::invalid_header)?);
                let payload_size = self.parse_payload(&head)?;

                Ok(Some((head, payload_size)))
            }
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                Ok(None)
            }
        }
    }

    fn parse_payload(&self, head: &ResponseHead) -> Result<PayloadSize, ParseError> {
        let status = head.status();
        if self.head_request || status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
            return Ok(PayloadSize::new_empty());
        }

        let te_header = head.headers().get(header::TRANSFER_ENCODING);
        let cl_header = head.headers().get(header::CONTENT_LENGTH);

        match (te_header, cl_header) {
            (Some(te_value), cl_value) => {
                if cl_value.is_some() {
                    warn!("transfer-encoding and content-length both present, ignoring content-length");
                }

                if is_chunked(te_value) { Ok(PayloadSize::new_chunked()) } else { Ok(PayloadSize::new_until_close()) }
            }

            (None, Some(cl_value)) => {
                let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;

                let length =
                    cl_str.trim().parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

                Ok(PayloadSize::new_length(length))
            }

            (None, None) => Ok(PayloadSize::new_until_close()),
        }
    }
}

/// Byte ranges of a header's name and value within the head buffer.
#[derive(Clone, Copy)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

impl HeaderIndex {
    const EMPTY: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, indices) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            indices.name = (name_start, name_start + header.name.len());
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            indices.value = (value_start, value_start + header.value.len());
        }
    }
}

/// Chunked must be the final transfer coding to frame the message (RFC 9112 section 6.1).
fn is_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Version;
    use indoc::indoc;

    fn decode(raw: &str, head_request: bool) -> (ResponseHead, PayloadSize, BytesMut) {
        let mut buf = BytesMut::from(raw);
        let (head, payload_size) = HeaderDecoder::new(head_request).decode(&mut buf).unwrap().unwrap();
        (head, payload_size, buf)
    }

    #[test]
    fn check_is_chunked() {
        assert!(is_chunked(&HeaderValue::from_static("chunked")));
        assert!(is_chunked(&HeaderValue::from_static("gzip, Chunked")));
        assert!(!is_chunked(&HeaderValue::from_static("chunked, gzip")));
        assert!(!is_chunked(&HeaderValue::from_static("gzip")));
    }

    #[test]
    fn content_length_response() {
        let (head, payload_size, rest) = decode(
            indoc! {"
            HTTP/1.1 200 OK
            Content-Type: application/json
            Content-Length: 7
            Link: <http://localhost/users/1>; rel=\"self\"

            {\"a\":1}"},
            false,
        );

        assert_eq!(head.status(), StatusCode::OK);
        assert_eq!(head.version(), Version::HTTP_11);
        assert_eq!(head.headers().len(), 3);
        assert_eq!(head.headers().get(header::CONTENT_TYPE), Some(&HeaderValue::from_static("application/json")));
        assert_eq!(payload_size, PayloadSize::Length(7));
        assert_eq!(&rest[..], b"{\"a\":1}");
    }

    #[test]
    fn chunked_wins_over_content_length() {
        let (_, payload_size, _) = decode("HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Length: 3\r\n\r\n", false);
        assert!(payload_size.is_chunked());
    }

    #[test]
    fn bodyless_responses() {
        let (_, payload_size, _) = decode("HTTP/1.1 204 No Content\r\nContent-Length: 10\r\n\r\n", false);
        assert!(payload_size.is_empty());

        let (_, payload_size, _) = decode("HTTP/1.1 304 Not Modified\r\n\r\n", false);
        assert!(payload_size.is_empty());

        let (_, payload_size, _) = decode("HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\n", true);
        assert!(payload_size.is_empty());
    }

    #[test]
    fn close_delimited_response() {
        let (head, payload_size, _) = decode("HTTP/1.0 200 OK\r\nServer: legacy\r\n\r\nhello", false);
        assert_eq!(head.version(), Version::HTTP_10);
        assert!(payload_size.is_until_close());
    }

    #[test]
    fn partial_head_needs_more_data() {
        let mut buf = BytesMut::from("HTTP/1.1 200 OK\r\nContent-Le");
        assert!(HeaderDecoder::default().decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 27);
    }

    #[test]
    fn invalid_content_length() {
        let mut buf = BytesMut::from("HTTP/1.1 200 OK\r\nContent-Length: ten\r\n\r\n");
        let result = HeaderDecoder::default().decode(&mut buf);
        assert!(matches!(result, Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn too_large_head() {
        let mut raw = String::from("HTTP/1.1 200 OK\r\nX-Padding: ");
        raw.push_str(&"a".repeat(MAX_HEADER_BYTES));
        let mut buf = BytesMut::from(raw.as_str());

        let result = HeaderDecoder::default().decode(&mut buf);
        assert!(matches!(result, Err(ParseError::TooLargeHeader { .. })));
    }
}
