//! Wire codecs.
//!
//! Inbound http:
//!
//! - [`RequestDecoder`]: the tokenizer, a `tokio_util` decoder yielding the
//!   head / body chunk / end events of pipelined requests
//! - [`ResponseDecoder`]: the same events for the responses a client reads back
//! - [`PartDecoder`]: reassembles those events into `Request<Body>` or
//!   `Response<Body>`
//!
//! Outbound http:
//!
//! - [`HttpSerializer`]: writes one request or response into caller sized
//!   buffers, resuming across calls; built on [`HeaderEncoder`] and
//!   [`ChunkedEncoder`]
//!
//! Websocket:
//!
//! - [`frame`]: single frame decoding and encoding, see [`FrameCodec`]
//!
//! None of these do io. The demand-driven stages in
//! [`connection`](crate::connection) drive them.

mod body;
pub mod frame;
mod header;
mod part_decoder;
mod request_decoder;
mod response_decoder;
mod serializer;

pub use body::{ChunkedEncoder, PayloadDecoder};
pub use frame::{FrameCodec, FrameDecoder, FrameEncoder};
pub use header::{
    HeaderDecoder, HeaderEncoder, MAX_HEADER_BYTES, MAX_HEADER_NUM, ResponseFraming, ResponseHeaderDecoder,
};
pub use part_decoder::{ParserState, PartDecoder, RequestPartDecoder, ResponsePartDecoder};
pub use request_decoder::RequestDecoder;
pub use response_decoder::ResponseDecoder;
pub use serializer::{HttpSerializer, RequestSerializer, ResponseSerializer, SerializerState};
