//! Response body decoding.
//!
//! [`PayloadDecoder`] wraps one strategy per [`PayloadSize`]:
//! - fixed length payloads (`Content-Length`)
//! - chunked transfer encoding
//! - close-delimited payloads, which only end at EOF
//! - no body at all

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};
use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    /// Everything up to EOF, `true` once EOF has been reported
    UntilClose(bool),
    NoBody,
}

impl PayloadDecoder {
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody }
    }

    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedDecoder::new()) }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthDecoder::new(size)) }
    }

    pub fn until_close() -> Self {
        Self { kind: Kind::UntilClose(false) }
    }

    pub fn is_until_close(&self) -> bool {
        matches!(self.kind, Kind::UntilClose(_))
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(n) => Self::fix_length(n),
            PayloadSize::Chunked => Self::chunked(),
            PayloadSize::UntilClose => Self::until_close(),
            PayloadSize::Empty => Self::empty(),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            Kind::UntilClose(true) => Ok(Some(PayloadItem::Eof)),
            Kind::UntilClose(false) if src.is_empty() => Ok(None),
            Kind::UntilClose(false) => Ok(Some(PayloadItem::Chunk(src.split().freeze()))),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }

    /// At EOF a close-delimited body is complete, any other body that still waits for data
    /// was cut short.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }

        match &mut self.kind {
            Kind::UntilClose(finished) => {
                *finished = true;
                Ok(Some(PayloadItem::Eof))
            }
            Kind::Length(length_decoder) => {
                warn!(remaining = length_decoder.remaining(), "connection closed in the middle of a body");
                Err(ParseError::Incomplete)
            }
            _ => {
                warn!("connection closed in the middle of a chunked body");
                Err(ParseError::Incomplete)
            }
        }
    }
}
