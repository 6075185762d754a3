//! HTTP message bodies.
//!
//! A [`Body`] is either empty, a fixed byte sequence whose length is known before
//! serialization starts, or a [`BodyStream`]: a finite, non restartable sequence of
//! chunks whose total length is unknown up front and which is therefore framed
//! with chunked transfer encoding.
//!
//! # Streaming
//!
//! A stream body is one end of a demand driven channel created by
//! [`body_channel`]:
//!
//! - [`BodyStream`]: the consumer side. Polling it requests one chunk at a time,
//!   [`Subscription::request`](crate::protocol::Subscription::request) can grant
//!   more, dropping or cancelling it tells the producer to stop.
//! - [`BodySender`]: the producer side. [`BodySender::poll_ready`] resolves only
//!   once the consumer has outstanding demand, which is what keeps a connection
//!   from reading request bytes nobody asked for.
//!
//! The channel itself buffers what was pushed ahead of demand, which only happens
//! for the chunks the request decoder held back before it knew the body was
//! going to be streamed.

mod body;
mod body_channel;

pub use body::Body;
pub use body_channel::{BodySender, BodyStream, body_channel};
