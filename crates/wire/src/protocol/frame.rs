//! WebSocket frame model (RFC 6455).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```
//!
//! Encoding and decoding live in [`crate::codec`]; this module only holds the
//! values and the masking transform.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::FrameError;

/// Largest payload a control frame may carry.
pub const MAX_CONTROL_PAYLOAD: u64 = 125;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    pub fn from_u8(value: u8) -> Result<Self, FrameError> {
        match value {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            v => Err(FrameError::InvalidOpcode(v)),
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }

    #[inline]
    pub fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

/// Everything in front of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode: OpCode,
    /// The masking key; a frame is masked exactly when this is present.
    pub mask: Option<[u8; 4]>,
    pub payload_len: u64,
}

impl FrameHeader {
    pub fn new(fin: bool, opcode: OpCode, payload_len: u64) -> Self {
        Self { fin, rsv1: false, rsv2: false, rsv3: false, opcode, mask: None, payload_len }
    }

    #[inline]
    pub fn is_masked(&self) -> bool {
        self.mask.is_some()
    }

    /// Number of bytes this header occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        let length_field = match self.payload_len {
            0..=125 => 0,
            126..=0xFFFF => 2,
            _ => 8,
        };
        let mask = if self.is_masked() { 4 } else { 0 };
        2 + length_field + mask
    }

    /// Appends the wire form of this header to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        if self.rsv1 {
            byte0 |= 0x40;
        }
        if self.rsv2 {
            byte0 |= 0x20;
        }
        if self.rsv3 {
            byte0 |= 0x10;
        }

        let mask_bit = if self.is_masked() { 0x80 } else { 0 };

        dst.reserve(self.encoded_len());
        dst.put_u8(byte0);
        match self.payload_len {
            len @ 0..=125 => dst.put_u8(mask_bit | len as u8),
            len @ 126..=0xFFFF => {
                dst.put_u8(mask_bit | 126);
                dst.put_u16(len as u16);
            }
            len => {
                dst.put_u8(mask_bit | 127);
                dst.put_u64(len);
            }
        }
        if let Some(key) = self.mask {
            dst.put_slice(&key);
        }
    }
}

/// One websocket frame with its payload stored unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self { header: FrameHeader::new(fin, opcode, payload.len() as u64), payload }
    }

    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, payload)
    }

    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, payload)
    }

    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, payload)
    }

    /// A pong answering a ping must echo the ping's payload; that is up to the caller.
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, payload)
    }

    /// A close frame with an optional status code and reason.
    ///
    /// The reason is dropped when no code is given, and truncated at a char
    /// boundary so the payload stays within a control frame's limit.
    pub fn close(code: Option<u16>, reason: &str) -> Self {
        let payload = match code {
            None => Bytes::new(),
            Some(code) => {
                let mut end = reason.len().min(MAX_CONTROL_PAYLOAD as usize - 2);
                while !reason.is_char_boundary(end) {
                    end -= 1;
                }
                let mut buf = BytesMut::with_capacity(2 + end);
                buf.put_u16(code);
                buf.put_slice(&reason.as_bytes()[..end]);
                buf.freeze()
            }
        };
        Self::new(true, OpCode::Close, payload)
    }

    pub fn continuation(fin: bool, payload: impl Into<Bytes>) -> Self {
        Self::new(fin, OpCode::Continuation, payload)
    }

    pub fn with_mask(mut self, key: [u8; 4]) -> Self {
        self.header.mask = Some(key);
        self
    }

    pub fn with_fin(mut self, fin: bool) -> Self {
        self.header.fin = fin;
        self
    }

    #[inline]
    pub fn opcode(&self) -> OpCode {
        self.header.opcode
    }

    #[inline]
    pub fn is_fin(&self) -> bool {
        self.header.fin
    }

    #[inline]
    pub fn is_masked(&self) -> bool {
        self.header.is_masked()
    }

    #[inline]
    pub fn is_control_frame(&self) -> bool {
        self.header.opcode.is_control()
    }

    /// Part of a fragmented message: either not final, or a continuation.
    #[inline]
    pub fn is_fragment(&self) -> bool {
        !self.header.fin || self.header.opcode == OpCode::Continuation
    }

    /// First frame of a fragmented message.
    #[inline]
    pub fn is_fragment_header(&self) -> bool {
        !self.header.fin && self.header.opcode != OpCode::Continuation
    }

    /// Neither first nor last frame of a fragmented message.
    #[inline]
    pub fn is_fragment_body(&self) -> bool {
        !self.header.fin && self.header.opcode == OpCode::Continuation
    }

    /// Last frame of a fragmented message.
    #[inline]
    pub fn is_fragment_footer(&self) -> bool {
        self.header.fin && self.header.opcode == OpCode::Continuation
    }

    /// An unfragmented message in a single frame.
    #[inline]
    pub fn is_complete_message(&self) -> bool {
        self.header.fin && self.header.opcode != OpCode::Continuation
    }

    /// Status code of a close frame, if it carries one.
    pub fn close_code(&self) -> Option<u16> {
        if self.header.opcode != OpCode::Close || self.payload.len() < 2 {
            return None;
        }
        Some(u16::from_be_bytes([self.payload[0], self.payload[1]]))
    }

    /// Reason text of a close frame; `None` when absent or not valid UTF-8.
    pub fn close_reason(&self) -> Option<&str> {
        if self.close_code().is_none() {
            return None;
        }
        std::str::from_utf8(&self.payload[2..]).ok()
    }

    /// Appends the wire form of this frame, masking the payload if a key is set.
    pub fn encode(&self, dst: &mut BytesMut) {
        self.header.encode(dst);
        let start = dst.len();
        dst.extend_from_slice(&self.payload);
        if let Some(key) = self.header.mask {
            apply_mask(&mut dst[start..], key);
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.header.encoded_len() + self.payload.len());
        self.encode(&mut dst);
        dst.freeze()
    }
}

/// XORs `buf` with the masking key. Applying it twice restores the input.
#[inline]
pub fn apply_mask(buf: &mut [u8], key: [u8; 4]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}
