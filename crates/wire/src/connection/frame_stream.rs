use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::{error, trace};

use crate::codec::FrameDecoder;
use crate::config::WireConfig;
use crate::protocol::FrameError;
use crate::protocol::demand::{Demand, Subscriber, Subscription};
use crate::protocol::frame::Frame;

/// The inbound websocket stage: transport bytes in, frames out, one frame per
/// demand.
///
/// Bytes may arrive in any split, a single byte or none at all per push. Partial
/// frames stay buffered until they complete; bytes past the end of a frame are
/// kept for the next one.
///
/// At most one maximum size frame is buffered: the payload limit of the decoder
/// plus the longest possible header.
#[derive(Debug)]
pub struct FrameStream {
    decoder: FrameDecoder,
    buffer: BytesMut,
    max_buffered: usize,
    overflow: Option<FrameError>,
    demand: Demand,
    input_closed: bool,
    terminated: bool,
}

/// 2 fixed bytes, an 8 byte extended length and a 4 byte masking key.
const MAX_HEADER_LEN: u64 = 14;

impl FrameStream {
    pub fn new(decoder: FrameDecoder) -> Self {
        let max_buffered =
            usize::try_from(decoder.max_payload_size().saturating_add(MAX_HEADER_LEN)).unwrap_or(usize::MAX);
        Self {
            decoder,
            buffer: BytesMut::new(),
            max_buffered,
            overflow: None,
            demand: Demand::new(),
            input_closed: false,
            terminated: false,
        }
    }

    pub fn with_config(config: &WireConfig) -> Self {
        Self::new(FrameDecoder::with_config(config))
    }

    /// Appends bytes delivered by the transport. Ignored once the stage has
    /// terminated.
    ///
    /// The transport is expected to push only while [`FrameStream::wants_bytes`].
    /// Bytes that would grow the buffer past one maximum size frame are refused,
    /// and the next [`FrameStream::produce`] fails the stage with
    /// [`FrameError::InvalidBufferSize`], with or without demand.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        if self.terminated || self.input_closed || self.overflow.is_some() {
            trace!(len = bytes.len(), "drop bytes pushed into a finished frame stream");
            return;
        }
        let buffered = self.buffer.len().saturating_add(bytes.len());
        if buffered > self.max_buffered {
            error!(buffered, max = self.max_buffered, "frame stream input overflows its buffer");
            self.overflow = Some(FrameError::invalid_buffer_size(buffered as u64, self.max_buffered as u64));
            return;
        }
        self.buffer.extend_from_slice(bytes);
    }

    /// The transport has no more bytes.
    pub fn close_input(&mut self) {
        self.input_closed = true;
    }

    /// Whether the stage needs more transport bytes to satisfy its demand.
    ///
    /// Only meaningful after [`FrameStream::produce`] ran on the current input.
    #[inline]
    pub fn wants_bytes(&self) -> bool {
        !self.terminated && !self.input_closed && self.demand.has_demand()
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of bytes buffered towards the next frame.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decodes and delivers frames while `downstream` has demand.
    ///
    /// A decode error, an overflowing input, or a closed input with a frame half
    /// buffered is delivered through `on_error`. A closed input is only looked at once there is demand,
    /// except that a clean end with nothing buffered is reported right away.
    pub fn produce<S>(&mut self, downstream: &mut S)
    where
        S: Subscriber<Frame, Error = FrameError>,
    {
        if let Some(e) = self.overflow.take() {
            self.terminate();
            downstream.on_error(e);
            return;
        }

        while !self.terminated {
            if !self.demand.has_demand() {
                if self.input_closed && self.buffer.is_empty() && !self.decoder.is_mid_frame() {
                    self.terminate();
                    downstream.on_close();
                }
                return;
            }

            let decoded = if self.input_closed {
                self.decoder.decode_eof(&mut self.buffer)
            } else {
                self.decoder.decode(&mut self.buffer)
            };

            match decoded {
                Ok(Some(frame)) => {
                    self.demand.consume();
                    trace!(opcode = ?frame.opcode(), len = frame.payload.len(), fin = frame.is_fin(), "deliver frame");
                    downstream.on_next(frame);
                }
                Ok(None) if self.input_closed => {
                    self.terminate();
                    downstream.on_close();
                }
                Ok(None) => return,
                Err(e) => {
                    error!(cause = %e, "frame stream failed");
                    self.terminate();
                    downstream.on_error(e);
                }
            }
        }
    }

    fn terminate(&mut self) {
        self.terminated = true;
        self.overflow = None;
        self.buffer = BytesMut::new();
        self.demand.reset();
    }
}

impl Default for FrameStream {
    fn default() -> Self {
        Self::new(FrameDecoder::default())
    }
}

impl Subscription for FrameStream {
    fn request(&mut self, n: u64) {
        if !self.terminated {
            self.demand.request(n);
        }
    }

    fn cancel(&mut self) {
        if self.terminated {
            return;
        }
        trace!(buffered = self.buffer.len(), "frame stream cancelled");
        self.terminate();
    }
}
