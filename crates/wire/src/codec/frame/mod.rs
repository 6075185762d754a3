//! Websocket frame codec.
//!
//! [`FrameDecoder`] and [`FrameEncoder`] work on single frames; reassembling a
//! fragmented message is left to the caller, see the fragment predicates on
//! [`Frame`]. [`FrameCodec`] combines both for use with
//! `tokio_util::codec::Framed`.

mod frame_decoder;
mod frame_encoder;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

pub use frame_decoder::{FrameDecoder, HeaderStatus, parse_header};
pub use frame_encoder::FrameEncoder;

use crate::config::WireConfig;
use crate::protocol::FrameError;
use crate::protocol::frame::Frame;

#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    decoder: FrameDecoder,
    encoder: FrameEncoder,
}

impl FrameCodec {
    pub fn new(decoder: FrameDecoder) -> Self {
        Self { decoder, encoder: FrameEncoder }
    }

    pub fn with_config(config: &WireConfig) -> Self {
        Self::new(FrameDecoder::with_config(config))
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decoder.decode(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.decoder.decode_eof(src)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encoder.encode(frame, dst)
    }
}
