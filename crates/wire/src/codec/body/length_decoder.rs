//! Decoder for bodies framed by `Content-Length`.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

/// Yields whatever part of the remaining `length` bytes is buffered, then `Eof`.
///
/// Bytes past the declared length belong to the next message and are never taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = usize::try_from(self.remaining).unwrap_or(usize::MAX).min(src.len());
        let bytes = src.split_to(len).freeze();

        self.remaining -= len as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let mut buffer = BytesMut::from(&b"101234567890abcdef\r\n\r\n"[..]);

        let mut decoder = LengthDecoder::new(10);
        let payload = decoder.decode(&mut buffer).unwrap().unwrap();

        assert_eq!(&payload.as_bytes().unwrap()[..], b"1012345678");
        assert_eq!(&buffer[..], b"90abcdef\r\n\r\n");

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn test_partial_delivery() {
        let mut decoder = LengthDecoder::new(4);

        let mut buffer = BytesMut::new();
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"ab");
        assert_eq!(&decoder.decode(&mut buffer).unwrap().unwrap().as_bytes().unwrap()[..], b"ab");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"cd");
        assert_eq!(&decoder.decode(&mut buffer).unwrap().unwrap().as_bytes().unwrap()[..], b"cd");
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }
}
