//! Websocket frame serialization.

use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::ensure;
use crate::protocol::FrameError;
use crate::protocol::frame::{Frame, MAX_CONTROL_PAYLOAD, OpCode};

/// Writes frames in wire form, masking the payload when the frame carries a key.
///
/// The exact inverse of [`FrameDecoder`](super::FrameDecoder): encoding a decoded
/// frame reproduces its original bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder;

impl Encoder<Frame> for FrameEncoder {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode(&frame, dst)
    }
}

impl Encoder<&Frame> for FrameEncoder {
    type Error = FrameError;

    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let header = &frame.header;
        ensure!(
            header.payload_len == frame.payload.len() as u64,
            FrameError::invalid_frame_parameters(format!(
                "declared length {} differs from payload length {}",
                header.payload_len,
                frame.payload.len()
            ))
        );
        if header.opcode.is_control() {
            if header.payload_len > MAX_CONTROL_PAYLOAD {
                error!(opcode = ?header.opcode, len = header.payload_len, "control frame too large to send");
                return Err(FrameError::FrameTooLarge { length: header.payload_len });
            }
            // a non-final close decodes, so it has to encode back
            ensure!(
                header.fin || header.opcode == OpCode::Close,
                FrameError::invalid_frame_parameters(format!("{:?} frame must not be fragmented", header.opcode))
            );
        }

        frame.encode(dst);
        Ok(())
    }
}
