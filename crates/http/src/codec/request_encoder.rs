//! Encoder for outbound HTTP requests
//!
//! A request is fed as a sequence of [`Message`] items: one `Header` carrying the head and
//! its [`PayloadSize`], then zero or more payload chunks, then the `Eof` marker. The
//! encoder tracks which phase it is in and rejects items that arrive out of order.

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, RequestHead, SendError};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

#[derive(Debug)]
pub struct RequestEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl RequestEncoder {
    pub fn new() -> Self {
        Self { header_encoder: HeaderEncoder, payload_encoder: None }
    }
}

impl Default for RequestEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Buf> Encoder<Message<(RequestHead, PayloadSize), D>> for RequestEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(RequestHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive request head");
                    return Err(SendError::invalid_body("previous request body is not finished"));
                }

                let payload_encoder = PayloadEncoder::try_from(payload_size)?;
                self.header_encoder.encode((head, payload_size), dst)?;
                self.payload_encoder = Some(payload_encoder);
                Ok(())
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect request head but receive payload item");
                    return Err(SendError::invalid_body("payload item without request head"));
                };

                payload_encoder.encode(payload_item, dst)?;
                if payload_encoder.is_finish() {
                    self.payload_encoder = None;
                }
                Ok(())
            }
        }
    }
}
