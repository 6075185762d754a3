//! Incremental chunked transfer encoding into caller sized buffers.

use std::fmt::Write;

use bytes::{Bytes, BytesMut};
use tracing::error;

use crate::buffer::copy_segment;
use crate::protocol::SendError;

const CRLF: &[u8] = b"\r\n";
const TERMINAL_CHUNK: &[u8] = b"0\r\n\r\n";

/// Frames one body chunk at a time as `<hex length>\r\n<data>\r\n`.
///
/// A chunk is accepted only once the previous one is completely written out, so
/// the encoder never holds more than one chunk. An empty chunk ends the body with
/// the terminal `0\r\n\r\n`; anything pushed afterwards is rejected.
#[derive(Debug)]
pub struct ChunkedEncoder {
    state: State,
    prefix: BytesMut,
    chunk: Bytes,
    offset: usize,
    eof: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the next chunk.
    Idle,
    Prefix,
    Data,
    Suffix,
    Terminal,
    /// The terminal chunk is written.
    Done,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { state: State::Idle, prefix: BytesMut::with_capacity(18), chunk: Bytes::new(), offset: 0, eof: false }
    }

    /// Queues the next chunk; an empty chunk ends the body.
    pub fn push_chunk(&mut self, chunk: Bytes) -> Result<(), SendError> {
        if self.eof {
            error!(len = chunk.len(), "chunk pushed after the terminal chunk");
            return Err(SendError::BodyAlreadyClosed);
        }
        if self.state != State::Idle {
            return Err(SendError::invalid_body("previous chunk is not fully written"));
        }

        self.offset = 0;
        if chunk.is_empty() {
            self.eof = true;
            self.state = State::Terminal;
            return Ok(());
        }

        self.prefix.clear();
        write!(self.prefix, "{:X}\r\n", chunk.len()).map_err(SendError::invalid_body)?;
        self.chunk = chunk;
        self.state = State::Prefix;
        Ok(())
    }

    /// Ends the body, same as pushing an empty chunk.
    pub fn finish(&mut self) -> Result<(), SendError> {
        self.push_chunk(Bytes::new())
    }

    /// Writes as much of the queued chunk as fits into `dst`.
    pub fn encode_into(&mut self, dst: &mut [u8]) -> usize {
        let mut written = 0;

        while written < dst.len() {
            let out = &mut dst[written..];
            let (segment, next): (&[u8], State) = match self.state {
                State::Idle | State::Done => break,
                State::Prefix => (&self.prefix[..], State::Data),
                State::Data => (&self.chunk[..], State::Suffix),
                State::Suffix => (CRLF, State::Idle),
                State::Terminal => (TERMINAL_CHUNK, State::Done),
            };

            written += copy_segment(segment, &mut self.offset, out);
            if self.offset == segment.len() {
                self.offset = 0;
                self.state = next;
                if next == State::Idle {
                    self.chunk = Bytes::new();
                }
            }
        }

        written
    }

    /// Ready for the next chunk.
    #[inline]
    pub fn needs_chunk(&self) -> bool {
        self.state == State::Idle && !self.eof
    }

    /// The terminal chunk has been written completely.
    #[inline]
    pub fn is_finish(&self) -> bool {
        self.state == State::Done
    }
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new()
    }
}
