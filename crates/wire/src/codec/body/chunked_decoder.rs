//! Decoder for `Transfer-Encoding: chunked` request bodies.
//!
//! See [RFC 9112 section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1).
//! Extensions and trailer fields are accepted and skipped.

use std::task::Poll;

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadItem};

use ChunkedState::*;

/// Streams the data of each chunk as it arrives, without waiting for the whole chunk.
///
/// The running total of declared chunk sizes is checked against `max_size` as soon
/// as a size line is complete, before any of that chunk's data is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    chunk_remaining: u64,
    total_size: u64,
    max_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    Size,
    SizeLws,
    Extension,
    SizeLf,
    Body,
    BodyCr,
    BodyLf,
    Trailer,
    TrailerLf,
    EndCr,
    EndLf,
    End,
}

impl ChunkedDecoder {
    pub fn new(max_size: u64) -> Self {
        Self { state: Size, chunk_remaining: 0, total_size: 0, max_size }
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == End {
                trace!(total_size = self.total_size, "finished reading chunked body");
                return Ok(Some(PayloadItem::Eof));
            }

            if src.is_empty() {
                return Ok(None);
            }

            let mut chunk = None;
            self.state = match self.step(src, &mut chunk) {
                Poll::Pending => return Ok(None),
                Poll::Ready(result) => result?,
            };

            if let Some(bytes) = chunk {
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }
        }
    }
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        if $src.is_empty() {
            return Poll::Pending;
        }
        $src.get_u8()
    }};
}

fn expect_byte(src: &mut BytesMut, expected: u8, next: ChunkedState, what: &str) -> Poll<Result<ChunkedState, ParseError>> {
    let b = try_next_byte!(src);
    if b == expected { Poll::Ready(Ok(next)) } else { Poll::Ready(Err(ParseError::invalid_body(format!("invalid chunk {what}")))) }
}

impl ChunkedDecoder {
    fn step(&mut self, src: &mut BytesMut, chunk: &mut Option<Bytes>) -> Poll<Result<ChunkedState, ParseError>> {
        match self.state {
            Size => self.read_size(src),
            SizeLws => Self::read_size_lws(src),
            Extension => Self::read_extension(src),
            SizeLf => self.read_size_lf(src),
            Body => self.read_body(src, chunk),
            BodyCr => expect_byte(src, b'\r', BodyLf, "body CR"),
            BodyLf => expect_byte(src, b'\n', Size, "body LF"),
            Trailer => {
                let b = try_next_byte!(src);
                Poll::Ready(Ok(if b == b'\r' { TrailerLf } else { Trailer }))
            }
            TrailerLf => expect_byte(src, b'\n', EndCr, "trailer LF"),
            EndCr => {
                let b = try_next_byte!(src);
                Poll::Ready(Ok(if b == b'\r' { EndLf } else { Trailer }))
            }
            EndLf => expect_byte(src, b'\n', End, "end LF"),
            End => Poll::Ready(Ok(End)),
        }
    }

    fn read_size(&mut self, src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        let digit = match try_next_byte!(src) {
            b @ b'0'..=b'9' => b - b'0',
            b @ b'a'..=b'f' => b + 10 - b'a',
            b @ b'A'..=b'F' => b + 10 - b'A',
            b'\t' | b' ' => return Poll::Ready(Ok(SizeLws)),
            b';' => return Poll::Ready(Ok(Extension)),
            b'\r' => return Poll::Ready(Ok(SizeLf)),
            _ => return Poll::Ready(Err(ParseError::invalid_body("invalid chunk size"))),
        };

        let size = self.chunk_remaining.checked_mul(16).and_then(|size| size.checked_add(u64::from(digit)));
        match size {
            Some(size) => {
                self.chunk_remaining = size;
                Poll::Ready(Ok(Size))
            }
            None => Poll::Ready(Err(ParseError::invalid_body("chunk size overflow"))),
        }
    }

    fn read_size_lws(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(src) {
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => Poll::Ready(Err(ParseError::invalid_body("invalid chunk size whitespace"))),
        }
    }

    fn read_extension(src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        // a bare LF inside an extension is rejected, the line must end with CRLF
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => Poll::Ready(Err(ParseError::invalid_body("chunk extension contains newline"))),
            _ => Poll::Ready(Ok(Extension)),
        }
    }

    fn read_size_lf(&mut self, src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        if try_next_byte!(src) != b'\n' {
            return Poll::Ready(Err(ParseError::invalid_body("invalid chunk size LF")));
        }

        if self.chunk_remaining == 0 {
            return Poll::Ready(Ok(EndCr));
        }

        let total_size = self.total_size.saturating_add(self.chunk_remaining);
        if total_size > self.max_size {
            return Poll::Ready(Err(ParseError::too_large_body(total_size, self.max_size)));
        }
        self.total_size = total_size;
        Poll::Ready(Ok(Body))
    }

    fn read_body(&mut self, src: &mut BytesMut, chunk: &mut Option<Bytes>) -> Poll<Result<ChunkedState, ParseError>> {
        let read_size = usize::try_from(self.chunk_remaining).unwrap_or(usize::MAX).min(src.len());

        self.chunk_remaining -= read_size as u64;
        *chunk = Some(src.split_to(read_size).freeze());

        if self.chunk_remaining > 0 { Poll::Ready(Ok(Body)) } else { Poll::Ready(Ok(BodyCr)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_LIMIT: u64 = u64::MAX;

    #[test]
    fn test_basic() {
        let mut buffer = BytesMut::from(&b"10\r\n1234567890abcdef\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(NO_LIMIT);

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&item.as_bytes().unwrap()[..], b"1234567890abcdef");

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn test_multiple_chunks() {
        let mut buffer = BytesMut::from(&b"5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(NO_LIMIT);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hello"));

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b", world"));

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn test_extensions_and_trailers() {
        let mut buffer = BytesMut::from(&b"5;chunk-ext=value\r\nhello\r\n0\r\nTrailer: value\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(NO_LIMIT);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hello"));

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_incomplete_chunk() {
        let mut buffer = BytesMut::from(&b"5\r\nhel"[..]);
        let mut decoder = ChunkedDecoder::new(NO_LIMIT);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hel"));
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"lo\r\n0\r\n\r\nGET");

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"lo"));
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());

        // bytes of the next message are left alone
        assert_eq!(&buffer[..], b"GET");
    }

    #[test]
    fn test_invalid_chunk_size() {
        let mut buffer = BytesMut::from(&b"xyz\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(NO_LIMIT);
        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::InvalidBody { .. })));
    }

    #[test]
    fn test_missing_crlf() {
        let mut buffer = BytesMut::from(&b"5\r\nhelloBad"[..]);
        let mut decoder = ChunkedDecoder::new(NO_LIMIT);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap(), &Bytes::from_static(b"hello"));
        assert!(decoder.decode(&mut buffer).is_err());
    }

    #[test]
    fn test_size_overflow() {
        let mut buffer = BytesMut::from(&b"fffffffffffffffff\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(NO_LIMIT);
        assert!(matches!(decoder.decode(&mut buffer), Err(ParseError::InvalidBody { .. })));
    }

    #[test]
    fn test_body_limit_checked_per_size_line() {
        let mut decoder = ChunkedDecoder::new(8);

        let mut buffer = BytesMut::from(&b"5\r\nhello\r\n"[..]);
        assert_eq!(decoder.decode(&mut buffer).unwrap().unwrap().as_bytes().unwrap(), &Bytes::from_static(b"hello"));

        // 5 + 4 crosses the limit before any of the second chunk is read
        buffer.extend_from_slice(b"4\r\ntest\r\n");
        assert!(matches!(
            decoder.decode(&mut buffer),
            Err(ParseError::TooLargeBody { current_size: 9, max_size: 8 })
        ));
    }

    #[test]
    fn test_large_chunk() {
        let size = 1024 * 1024;
        let mut data = format!("{size:x}\r\n").into_bytes();
        data.extend(vec![b'A'; size]);
        data.extend(b"\r\n0\r\n\r\n");

        let mut buffer = BytesMut::from(&data[..]);
        let mut decoder = ChunkedDecoder::new(NO_LIMIT);

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().len(), size);
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn test_zero_size_chunk() {
        let mut buffer = BytesMut::from(&b"0\r\n\r\n"[..]);
        let mut decoder = ChunkedDecoder::new(0);
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }
}
