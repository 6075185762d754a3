//! Tokenizer turning response bytes into head / body chunk / end events.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::{ResponseFraming, ResponseHeaderDecoder};
use crate::config::DEFAULT_MAX_BODY_SIZE;
use crate::ensure;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, ResponseHeader};

/// Decodes the responses a client reads back, in the same event shape as
/// [`RequestDecoder`](crate::codec::RequestDecoder).
///
/// A response without `Content-Length` or chunked framing runs until the server
/// closes the connection: its head is announced with [`PayloadSize::Chunked`]
/// since its length is unknown, and its `Eof` only comes from
/// [`Decoder::decode_eof`]. Every body, however it is framed, is bounded by
/// `max_body_size`.
#[derive(Debug)]
pub struct ResponseDecoder {
    header_decoder: ResponseHeaderDecoder,
    body: Option<BodyDecoder>,
    max_body_size: u64,
}

#[derive(Debug)]
enum BodyDecoder {
    Framed(PayloadDecoder),
    /// Bytes received so far.
    UntilClose(u64),
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Self::with_max_body_size(DEFAULT_MAX_BODY_SIZE)
    }

    pub fn with_max_body_size(max_body_size: u64) -> Self {
        Self { header_decoder: ResponseHeaderDecoder::new(max_body_size), body: None, max_body_size }
    }

    /// Whether the decoder is in the middle of a response body.
    #[inline]
    pub fn is_decoding_body(&self) -> bool {
        self.body.is_some()
    }
}

impl Default for ResponseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ResponseDecoder {
    type Item = Message<(ResponseHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(body) = &mut self.body {
            let item = match body {
                BodyDecoder::Framed(payload_decoder) => payload_decoder.decode(src)?,
                BodyDecoder::UntilClose(_) if src.is_empty() => None,
                BodyDecoder::UntilClose(received) => {
                    *received = received.saturating_add(src.len() as u64);
                    ensure!(*received <= self.max_body_size, ParseError::too_large_body(*received, self.max_body_size));
                    Some(PayloadItem::Chunk(src.split().freeze()))
                }
            };

            if item.as_ref().is_some_and(PayloadItem::is_eof) {
                self.body = None;
            }
            return Ok(item.map(Message::Payload));
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, framing)) => {
                trace!(status = %header.status(), ?framing, "decoded response head");
                let payload_size = match framing {
                    ResponseFraming::Payload(payload_size) => {
                        self.body = Some(BodyDecoder::Framed(PayloadDecoder::new(payload_size, self.max_body_size)));
                        payload_size
                    }
                    ResponseFraming::UntilClose => {
                        self.body = Some(BodyDecoder::UntilClose(0));
                        PayloadSize::Chunked
                    }
                };
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }

        match self.body {
            Some(BodyDecoder::UntilClose(received)) => {
                trace!(received, "connection closed, response body complete");
                self.body = None;
                Ok(Some(Message::Payload(PayloadItem::Eof)))
            }
            Some(BodyDecoder::Framed(_)) => Err(ParseError::invalid_body("connection closed inside a response body")),
            None if src.is_empty() => Ok(None),
            None => Err(ParseError::invalid_header("connection closed inside a response head")),
        }
    }
}
