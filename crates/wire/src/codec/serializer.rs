//! Incremental serialization of one http message into caller supplied buffers.

use std::marker::PhantomData;
use std::mem;

use bytes::{Bytes, BytesMut};
use http::{Request, Response};
use tokio_util::codec::Encoder;
use tracing::{debug, error, trace};

use crate::buffer::copy_segment;
use crate::codec::body::ChunkedEncoder;
use crate::codec::header::HeaderEncoder;
use crate::ensure;
use crate::protocol::body::{Body, BodyStream};
use crate::protocol::{HttpMessage, SendError};

const CRLF: &[u8] = b"\r\n";

/// Which segment of the message the next byte comes from.
///
/// The order is strictly `FirstLine -> Headers -> Crlf -> Body -> NoMessage`; a
/// message without body bytes skips `Body`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerState {
    NoMessage,
    FirstLine,
    Headers,
    Crlf,
    Body,
}

#[derive(Debug, Default)]
enum BodySegment {
    #[default]
    None,
    Static(Bytes),
    Chunked(ChunkedEncoder),
}

/// Writes an [`HttpMessage`] across as many buffers as it takes.
///
/// [`HttpSerializer::set_message`] renders the first line and the header block
/// once; [`HttpSerializer::serialize_into`] then copies from the current segment
/// into the given buffer, fills it as far as possible and resumes exactly where it
/// stopped on the next call.
///
/// A stream body is not polled by the serializer itself. `set_message` hands the
/// [`BodyStream`] back to the caller, who feeds its chunks in with
/// [`HttpSerializer::push_chunk`] whenever [`HttpSerializer::needs_chunk`] says so
/// and ends it with [`HttpSerializer::finish_body`].
#[derive(Debug)]
pub struct HttpSerializer<M> {
    state: SerializerState,
    offset: usize,
    first_line: BytesMut,
    headers: BytesMut,
    body: BodySegment,
    header_encoder: HeaderEncoder,
    _message: PhantomData<fn(M)>,
}

pub type RequestSerializer = HttpSerializer<Request<Body>>;

pub type ResponseSerializer = HttpSerializer<Response<Body>>;

impl<M: HttpMessage> HttpSerializer<M> {
    pub fn new() -> Self {
        Self {
            state: SerializerState::NoMessage,
            offset: 0,
            first_line: BytesMut::with_capacity(64),
            headers: BytesMut::with_capacity(512),
            body: BodySegment::None,
            header_encoder: HeaderEncoder,
            _message: PhantomData,
        }
    }

    /// Starts serializing `message`.
    ///
    /// Progress on a message still in flight is discarded; bytes of it that were
    /// already handed out are the caller's concern. Returns the body stream the
    /// caller has to drain into [`HttpSerializer::push_chunk`], if the body is one.
    pub fn set_message(&mut self, mut message: M) -> Result<Option<BodyStream>, SendError> {
        if !self.ready() {
            debug!(state = ?self.state, offset = self.offset, "discard message in flight");
        }
        self.reset();

        let payload_size = message.body().payload_size();
        let encoded = message
            .encode_first_line(&mut self.first_line)
            .and_then(|()| self.header_encoder.encode((&message, payload_size), &mut self.headers));
        if let Err(e) = encoded {
            self.reset();
            return Err(e);
        }

        let stream = match mem::take(message.body_mut()) {
            Body::Empty => None,
            Body::Full(bytes) => {
                if !bytes.is_empty() {
                    self.body = BodySegment::Static(bytes);
                }
                None
            }
            Body::Stream(stream) => {
                self.body = BodySegment::Chunked(ChunkedEncoder::new());
                Some(stream)
            }
        };

        trace!(?payload_size, head_len = self.first_line.len() + self.headers.len() + CRLF.len(), "message set");
        self.state = SerializerState::FirstLine;
        Ok(stream)
    }

    /// Fills `dst` with the next bytes of the message and returns how many were
    /// written.
    ///
    /// Returns fewer than `dst.len()` bytes only when the message is complete or
    /// the serializer waits for the next body chunk; `0` in the latter case means
    /// nothing could be written.
    pub fn serialize_into(&mut self, dst: &mut [u8]) -> Result<usize, SendError> {
        if self.state == SerializerState::NoMessage {
            error!("serialize called without an active message");
            return Err(SendError::NoActiveMessage);
        }

        let mut written = 0;
        while written < dst.len() {
            let out = &mut dst[written..];
            let (segment, next): (&[u8], SerializerState) = match self.state {
                SerializerState::NoMessage => break,
                SerializerState::FirstLine => (&self.first_line[..], SerializerState::Headers),
                SerializerState::Headers => (&self.headers[..], SerializerState::Crlf),
                SerializerState::Crlf => {
                    let next = match self.body {
                        BodySegment::None => SerializerState::NoMessage,
                        _ => SerializerState::Body,
                    };
                    (CRLF, next)
                }
                SerializerState::Body => match &mut self.body {
                    BodySegment::Static(bytes) => (&bytes[..], SerializerState::NoMessage),
                    BodySegment::Chunked(encoder) => {
                        let n = encoder.encode_into(out);
                        written += n;
                        if encoder.is_finish() {
                            self.complete();
                            break;
                        }
                        if n == 0 {
                            // waiting for push_chunk
                            break;
                        }
                        continue;
                    }
                    BodySegment::None => (&[][..], SerializerState::NoMessage),
                },
            };

            written += copy_segment(segment, &mut self.offset, out);
            if self.offset == segment.len() {
                self.offset = 0;
                self.state = next;
                if next == SerializerState::NoMessage {
                    self.complete();
                }
            }
        }

        Ok(written)
    }

    /// Queues the next chunk of a stream body; an empty chunk ends it.
    pub fn push_chunk(&mut self, chunk: Bytes) -> Result<(), SendError> {
        ensure!(self.state != SerializerState::NoMessage, SendError::NoActiveMessage);
        match &mut self.body {
            BodySegment::Chunked(encoder) => encoder.push_chunk(chunk),
            _ => Err(SendError::invalid_body("message body is not a stream")),
        }
    }

    /// Ends a stream body with the terminal chunk.
    pub fn finish_body(&mut self) -> Result<(), SendError> {
        self.push_chunk(Bytes::new())
    }

    /// Whether the stream body is waiting for its next chunk.
    pub fn needs_chunk(&self) -> bool {
        match &self.body {
            BodySegment::Chunked(encoder) => self.state != SerializerState::NoMessage && encoder.needs_chunk(),
            _ => false,
        }
    }

    /// No message in flight.
    #[inline]
    pub fn ready(&self) -> bool {
        self.state == SerializerState::NoMessage
    }

    #[inline]
    pub fn state(&self) -> SerializerState {
        self.state
    }

    /// Drops the message in flight, if any.
    pub fn reset(&mut self) {
        self.complete();
    }

    fn complete(&mut self) {
        self.state = SerializerState::NoMessage;
        self.offset = 0;
        self.first_line.clear();
        self.headers.clear();
        self.body = BodySegment::None;
    }
}

impl<M: HttpMessage> Default for HttpSerializer<M> {
    fn default() -> Self {
        Self::new()
    }
}
