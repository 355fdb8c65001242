//! Decoder for inbound HTTP responses
//!
//! Yields a `Header` message for every final response, followed by its payload items and
//! an `Eof` item. Interim 1xx responses (except `101 Switching Protocols`) are consumed
//! silently. Since a response can only be framed knowing the request it answers, the
//! caller announces every request method with [`ResponseDecoder::expect_response_to`] as the
//! request is written. Announcements are queued, so pipelined responses are framed by the
//! request they answer.

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadSize, ResponseHead};
use bytes::BytesMut;
use std::collections::VecDeque;
use http::{Method, StatusCode};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

#[derive(Debug)]
pub struct ResponseDecoder {
    /// One entry per request still waiting for its response, `true` for HEAD
    pending: VecDeque<bool>,
    payload_decoder: Option<PayloadDecoder>,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Self { pending: VecDeque::new(), payload_decoder: None }
    }

    /// Queues the response to a request with `method`.
    ///
    /// Responses decoded without an announcement are framed as answers to a GET.
    pub fn expect_response_to(&mut self, method: &Method) {
        self.pending.push_back(method == Method::HEAD);
    }

    /// Number of announced requests whose response head has not been decoded yet.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether a response body is being decoded right now.
    pub fn in_payload(&self) -> bool {
        self.payload_decoder.is_some()
    }

    fn decode_payload(&mut self, src: &mut BytesMut, eof: bool) -> Result<Option<<Self as Decoder>::Item>, ParseError> {
        let Some(payload_decoder) = &mut self.payload_decoder else {
            return Ok(None);
        };

        let item = if eof { payload_decoder.decode_eof(src)? } else { payload_decoder.decode(src)? };
        Ok(item.map(|item| {
            if item.is_eof() {
                trace!("response payload finished");
                self.payload_decoder = None;
            }
            Message::Payload(item)
        }))
    }
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ResponseDecoder {
    type Item = Message<(ResponseHead, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.payload_decoder.is_some() {
            return self.decode_payload(src, false);
        }

        let mut header_decoder = HeaderDecoder::new(self.pending.front().copied().unwrap_or(false));
        loop {
            let Some((head, payload_size)) = header_decoder.decode(src)? else {
                return Ok(None);
            };

            let status = head.status();
            if status.is_informational() && status != StatusCode::SWITCHING_PROTOCOLS {
                debug!(%status, "skip interim response");
                continue;
            }

            self.pending.pop_front();
            self.payload_decoder = Some(PayloadDecoder::from(payload_size));
            return Ok(Some(Message::Header((head, payload_size))));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.payload_decoder.is_some() {
            return self.decode_payload(src, true);
        }

        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => {
                debug!(buffered = src.len(), "connection closed in the middle of a response head");
                Err(ParseError::Incomplete)
            }
        }
    }
}
