//! Incremental websocket frame parsing.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::{error, trace};

use crate::config::{DEFAULT_MAX_PAYLOAD_SIZE, WireConfig};
use crate::ensure;
use crate::protocol::FrameError;
use crate::protocol::frame::{Frame, FrameHeader, MAX_CONTROL_PAYLOAD, OpCode, apply_mask};

/// Outcome of [`parse_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    /// The header is complete and occupies the first `header_len` bytes.
    Complete { header: FrameHeader, header_len: usize },
    /// More bytes are needed; nothing was consumed.
    NeedMoreBytes,
}

/// Parses a frame header from the start of `src` without consuming anything.
///
/// Checks run in this order, each as soon as the bytes it needs are present:
///
/// 1. the opcode is known, else [`FrameError::InvalidOpcode`]
/// 2. a control frame's length indicator is at most 125, else [`FrameError::FrameTooLarge`]
/// 3. a non-final frame is a continuation, text, binary or close frame, else
///    [`FrameError::InvalidFrameParameters`]
/// 4. the payload length is at most `max_payload_size`, else
///    [`FrameError::InvalidBufferSize`]
/// 5. with `require_mask`, the frame carries a masking key, else [`FrameError::MissingMask`]
pub fn parse_header(src: &[u8], max_payload_size: u64, require_mask: bool) -> Result<HeaderStatus, FrameError> {
    let &[byte0, byte1, ..] = src else {
        return Ok(HeaderStatus::NeedMoreBytes);
    };

    let opcode = OpCode::from_u8(byte0 & 0x0F)?;
    let fin = byte0 & 0x80 != 0;
    let masked = byte1 & 0x80 != 0;
    let indicator = byte1 & 0x7F;

    ensure!(!opcode.is_control() || u64::from(indicator) <= MAX_CONTROL_PAYLOAD, FrameError::FrameTooLarge {
        length: u64::from(indicator)
    });

    // a non-final close is let through for peers that send one
    ensure!(
        fin || matches!(opcode, OpCode::Continuation | OpCode::Text | OpCode::Binary | OpCode::Close),
        FrameError::invalid_frame_parameters(format!("{opcode:?} frame must not be fragmented"))
    );

    let (payload_len, length_end) = match indicator {
        126 => match src.get(2..4) {
            Some(bytes) => (u64::from(u16::from_be_bytes([bytes[0], bytes[1]])), 4),
            None => return Ok(HeaderStatus::NeedMoreBytes),
        },
        127 => match src.get(2..10).and_then(|bytes| <[u8; 8]>::try_from(bytes).ok()) {
            Some(bytes) => (u64::from_be_bytes(bytes), 10),
            None => return Ok(HeaderStatus::NeedMoreBytes),
        },
        len => (u64::from(len), 2),
    };

    ensure!(payload_len <= max_payload_size, FrameError::invalid_buffer_size(payload_len, max_payload_size));

    let (mask, header_len) = if masked {
        match src.get(length_end..length_end + 4) {
            Some(key) => (Some([key[0], key[1], key[2], key[3]]), length_end + 4),
            None => return Ok(HeaderStatus::NeedMoreBytes),
        }
    } else {
        (None, length_end)
    };

    ensure!(!require_mask || mask.is_some(), FrameError::MissingMask);

    let header = FrameHeader {
        fin,
        rsv1: byte0 & 0x40 != 0,
        rsv2: byte0 & 0x20 != 0,
        rsv3: byte0 & 0x10 != 0,
        opcode,
        mask,
        payload_len,
    };
    Ok(HeaderStatus::Complete { header, header_len })
}

/// Decodes frames from a byte stream, unmasking payloads.
///
/// Partial headers stay in the source buffer until they are complete. Space for a
/// payload is only reserved once its header passed every check.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: DecodeState,
    max_payload_size: u64,
    require_mask: bool,
}

#[derive(Debug, Clone, Copy)]
enum DecodeState {
    Header,
    Payload(FrameHeader),
}

impl FrameDecoder {
    pub fn new(max_payload_size: u64) -> Self {
        Self { state: DecodeState::Header, max_payload_size, require_mask: false }
    }

    pub fn with_config(config: &WireConfig) -> Self {
        Self::new(config.max_payload_size).require_mask(config.require_masked_frames)
    }

    /// Rejects unmasked frames, as a server must.
    #[must_use]
    pub fn require_mask(mut self, require_mask: bool) -> Self {
        self.require_mask = require_mask;
        self
    }

    #[inline]
    pub fn max_payload_size(&self) -> u64 {
        self.max_payload_size
    }

    /// Whether part of a frame has been consumed and the rest is still missing.
    #[inline]
    pub fn is_mid_frame(&self) -> bool {
        matches!(self.state, DecodeState::Payload(_))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_SIZE)
    }
}

impl Decoder for FrameDecoder {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.state {
            DecodeState::Payload(header) => header,
            DecodeState::Header => match parse_header(src, self.max_payload_size, self.require_mask) {
                Ok(HeaderStatus::NeedMoreBytes) => return Ok(None),
                Ok(HeaderStatus::Complete { header, header_len }) => {
                    trace!(opcode = ?header.opcode, fin = header.fin, payload_len = header.payload_len, "parsed frame header");
                    src.advance(header_len);
                    self.state = DecodeState::Payload(header);
                    header
                }
                Err(e) => {
                    error!(cause = %e, "invalid frame header");
                    return Err(e);
                }
            },
        };

        // bounded by max_payload_size, which was checked above
        let payload_len = usize::try_from(header.payload_len)
            .map_err(FrameError::invalid_frame_parameters)?;

        if src.len() < payload_len {
            src.reserve(payload_len - src.len());
            return Ok(None);
        }

        let mut payload = src.split_to(payload_len);
        if let Some(key) = header.mask {
            apply_mask(&mut payload, key);
        }

        self.state = DecodeState::Header;
        Ok(Some(Frame { header, payload: payload.freeze() }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() && !self.is_mid_frame() => Ok(None),
            None => Err(FrameError::IncompleteFrame { buffered: src.len() }),
        }
    }
}
