//! Tokenizer turning request bytes into head / body chunk / end events.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::config::DEFAULT_MAX_BODY_SIZE;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

/// Decodes a stream of pipelined requests.
///
/// Each request yields one `Message::Header`, then its body as
/// `Message::Payload(PayloadItem::Chunk(_))` items and finally exactly one
/// `Message::Payload(PayloadItem::Eof)`, also for requests without a body.
/// Bytes past the end of a request stay in the buffer for the next one.
#[derive(Debug)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
    max_body_size: u64,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::with_max_body_size(DEFAULT_MAX_BODY_SIZE)
    }

    pub fn with_max_body_size(max_body_size: u64) -> Self {
        Self { header_decoder: HeaderDecoder::new(max_body_size), payload_decoder: None, max_body_size }
    }

    /// Whether the decoder is in the middle of a request body.
    #[inline]
    pub fn is_decoding_body(&self) -> bool {
        self.payload_decoder.is_some()
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder = None;
                    Some(Message::Payload(item))
                }
                None => None,
            };
            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                trace!(method = %header.method(), uri = %header.uri(), ?payload_size, "decoded request head");
                self.payload_decoder = Some(PayloadDecoder::new(payload_size, self.max_body_size));
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }
}
