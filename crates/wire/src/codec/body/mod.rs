//! Body framing.
//!
//! Inbound, [`PayloadDecoder`] reads a request body framed by `Content-Length`
//! or chunked transfer encoding. Outbound, [`ChunkedEncoder`] frames a streamed
//! body into caller sized buffers; fixed bodies need no framing.

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod payload_decoder;

pub use chunked_encoder::ChunkedEncoder;
pub use payload_decoder::PayloadDecoder;
