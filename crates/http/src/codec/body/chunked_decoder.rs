//! Decoder for `Transfer-Encoding: chunked` bodies ([RFC 9112 section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1)).
//!
//! The body is a series of `size-in-hex [; extensions] CRLF data CRLF` chunks closed by a
//! zero-sized chunk, optional trailer fields and a final empty line. Data is handed out as
//! soon as it arrives, a chunk split across reads produces several payload items.

use crate::protocol::{ParseError, PayloadItem};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

/// Longest size or trailer line we are willing to buffer.
const MAX_LINE_BYTES: usize = 4 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for a complete chunk size line
    Size,
    /// Inside a chunk with this many bytes left
    Data(u64),
    /// Waiting for the CRLF that terminates chunk data
    DataEnd,
    /// After the last chunk, reading trailer lines until an empty one
    Trailer,
    Done,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size }
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::Size => {
                    let Some(line) = take_line(src)? else {
                        return Ok(None);
                    };

                    let size = parse_chunk_size(&line)?;
                    trace!(size, "read chunk size");
                    self.state = if size == 0 { State::Trailer } else { State::Data(size) };
                }

                State::Data(remaining) => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let read_size = remaining.min(src.len() as u64);
                    let left = remaining - read_size;
                    self.state = if left == 0 { State::DataEnd } else { State::Data(left) };

                    #[allow(clippy::cast_possible_truncation, reason = "bounded by the buffer length")]
                    let bytes = src.split_to(read_size as usize).freeze();
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                State::DataEnd => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    if &src[..2] != b"\r\n" {
                        return Err(ParseError::invalid_body("chunk data is not terminated by CRLF"));
                    }
                    src.advance(2);
                    self.state = State::Size;
                }

                State::Trailer => {
                    let Some(line) = take_line(src)? else {
                        return Ok(None);
                    };

                    if line.is_empty() {
                        trace!("finished reading chunked data");
                        self.state = State::Done;
                    } else {
                        trace!(len = line.len(), "skip trailer field");
                    }
                }

                State::Done => return Ok(Some(PayloadItem::Eof)),
            }
        }
    }
}

/// Splits one line off `src`, without its line terminator.
///
/// A bare LF is accepted as terminator as well.
fn take_line(src: &mut BytesMut) -> Result<Option<BytesMut>, ParseError> {
    let Some(lf) = src.iter().position(|b| *b == b'\n') else {
        if src.len() > MAX_LINE_BYTES {
            return Err(ParseError::invalid_body(format!("chunk line exceeds {MAX_LINE_BYTES} bytes")));
        }
        return Ok(None);
    };

    let mut line = src.split_to(lf + 1);
    line.truncate(lf);
    if line.last() == Some(&b'\r') {
        line.truncate(lf - 1);
    }
    Ok(Some(line))
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, ParseError> {
    let digits = line.split(|b| *b == b';').next().unwrap_or_default().trim_ascii();
    if digits.is_empty() {
        return Err(ParseError::invalid_body("empty chunk size"));
    }

    digits.iter().try_fold(0u64, |size, b| {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => return Err(ParseError::invalid_body(format!("invalid chunk size byte {:?}", *b as char))),
        };
        size.checked_mul(16)
            .and_then(|size| size.checked_add(u64::from(digit)))
            .ok_or_else(|| ParseError::invalid_body("chunk size overflows u64"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn drain(decoder: &mut ChunkedDecoder, buffer: &mut BytesMut) -> (Vec<u8>, bool) {
        let mut body = Vec::new();
        while let Some(item) = decoder.decode(buffer).unwrap() {
            match item {
                PayloadItem::Chunk(bytes) => body.extend_from_slice(&bytes),
                PayloadItem::Eof => return (body, true),
            }
        }
        (body, false)
    }

    #[test]
    fn single_chunk() {
        let mut buffer = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new();

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap(), &Bytes::from_static(b"1234567890abcdef"));

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert!(buffer.is_empty());
    }

    #[test]
    fn several_chunks_with_extensions_and_trailers() {
        let mut buffer = BytesMut::from(&b"5;name=value\r\nhello\r\n7\r\n, world\r\n0\r\nExpires: never\r\n\r\n"[..]);
        let (body, finished) = drain(&mut ChunkedDecoder::new(), &mut buffer);

        assert!(finished);
        assert_eq!(body, b"hello, world");
    }

    #[test]
    fn data_split_across_reads() {
        let mut buffer = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new();

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap(), &Bytes::from_static(b"hel"));
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"lo\r\nA");
        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(item.as_bytes().unwrap(), &Bytes::from_static(b"lo"));
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"\r\n0123456789\r\n0\r\n\r\n");
        let (body, finished) = drain(&mut decoder, &mut buffer);
        assert!(finished);
        assert_eq!(body, b"0123456789");
    }

    #[test]
    fn missing_data_terminator() {
        let mut buffer = BytesMut::from(&b"5\r\nhelloBad"[..]);
        let mut decoder = ChunkedDecoder::new();

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_chunk());
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn invalid_sizes() {
        assert!(ChunkedDecoder::new().decode(&mut BytesMut::from(&b"xyz\r\n"[..])).is_err());
        assert!(ChunkedDecoder::new().decode(&mut BytesMut::from(&b"\r\n"[..])).is_err());
        assert!(ChunkedDecoder::new().decode(&mut BytesMut::from(&b"10000000000000000\r\n"[..])).is_err());
    }

    #[test]
    fn oversized_size_line() {
        let mut buffer = BytesMut::from(vec![b'1'; MAX_LINE_BYTES + 1].as_slice());
        assert!(ChunkedDecoder::new().decode(&mut buffer).is_err());
    }

    #[test]
    fn large_chunk() {
        let size = 1024 * 1024;
        let mut data = format!("{size:x}\r\n").into_bytes();
        data.extend(vec![b'A'; size]);
        data.extend(b"\r\n0\r\n\r\n");

        let (body, finished) = drain(&mut ChunkedDecoder::new(), &mut BytesMut::from(&data[..]));
        assert!(finished);
        assert_eq!(body.len(), size);
        assert!(body.iter().all(|&b| b == b'A'));
    }
}
