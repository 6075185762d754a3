//! Demand-driven stages and the connection driver built from them.
//!
//! - [`SerializerStream`]: outbound http, messages in and byte units out
//! - [`FrameStream`]: inbound websocket, transport bytes in and frames out
//! - [`HttpConnection`]: serves http/1.1 requests over any tokio reader and
//!   writer pair, wiring the request codecs, a [`Handler`](crate::handler::Handler)
//!   and a [`SerializerStream`] together
//!
//! Each stage produces only against demand granted through
//! [`Subscription::request`](crate::protocol::demand::Subscription::request) and
//! stops for good on
//! [`Subscription::cancel`](crate::protocol::demand::Subscription::cancel).

mod frame_stream;
mod http_connection;
mod serializer_stream;

pub use frame_stream::FrameStream;
pub use http_connection::HttpConnection;
pub use serializer_stream::SerializerStream;
