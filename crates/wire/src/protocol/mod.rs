//! Protocol values shared by the codecs and the connection stages.
//!
//! - [`message`]: decoded wire events ([`Message`], [`PayloadItem`]) and body framing ([`PayloadSize`])
//! - [`request`]: the head of an inbound request ([`RequestHeader`])
//! - [`response`]: the head of an inbound response ([`ResponseHeader`])
//! - [`http_message`]: the [`HttpMessage`] view the serializer writes from
//! - [`body`]: the [`Body`](body::Body) type and its demand-driven stream channel
//! - [`frame`]: websocket frames
//! - [`demand`]: the request/cancel backpressure protocol every stage follows
//! - [`error`]: [`ParseError`], [`SendError`], [`FrameError`] and [`HttpError`]

mod message;
pub use message::Message;
pub use message::MessageHead;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;
pub use request::is_keep_alive;

mod response;
pub use response::ResponseHeader;

mod http_message;
pub use http_message::HttpMessage;
pub use http_message::update_transport_headers;

mod error;
pub use error::FrameError;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
pub mod demand;
pub mod frame;
