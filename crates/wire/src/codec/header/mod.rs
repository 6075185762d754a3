//! Header blocks.
//!
//! [`HeaderDecoder`] parses an inbound request head and decides its body framing,
//! [`ResponseHeaderDecoder`] does the same for a response head,
//! [`HeaderEncoder`] writes the header lines of an outbound message.

mod header_decoder;
mod header_encoder;
mod response_header_decoder;

pub use header_decoder::{HeaderDecoder, MAX_HEADER_BYTES, MAX_HEADER_NUM};
pub use header_encoder::HeaderEncoder;
pub use response_header_decoder::{ResponseFraming, ResponseHeaderDecoder};
