//! Picks the body decoder matching the framing of the request head.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    NoBody,
}

impl PayloadDecoder {
    /// `max_body_size` only bounds chunked bodies; a `Content-Length` is checked
    /// against it by the header decoder before this decoder is created.
    pub fn new(payload_size: PayloadSize, max_body_size: u64) -> Self {
        let kind = match payload_size {
            PayloadSize::Length(length) => Kind::Length(LengthDecoder::new(length)),
            PayloadSize::Chunked => Kind::Chunked(ChunkedDecoder::new(max_body_size)),
            PayloadSize::Empty => Kind::NoBody,
        };
        Self { kind }
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody)
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(length_decoder) => length_decoder.decode(src),
            Kind::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_payload_size() {
        assert!(PayloadDecoder::new(PayloadSize::Empty, 0).is_empty());
        assert!(PayloadDecoder::new(PayloadSize::Chunked, 0).is_chunked());

        let length = PayloadDecoder::new(PayloadSize::Length(3), 0);
        assert!(!length.is_empty());
        assert!(!length.is_chunked());
    }

    #[test]
    fn no_body_ends_immediately() {
        let mut buffer = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        let mut decoder = PayloadDecoder::new(PayloadSize::Empty, 0);

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert_eq!(buffer.len(), 16);
    }
}
