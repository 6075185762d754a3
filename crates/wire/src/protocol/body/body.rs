use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::{Frame, SizeHint};

use crate::protocol::body::{BodySender, BodyStream, body_channel};
use crate::protocol::{ParseError, PayloadSize};

/// The body of an http request or response.
#[derive(Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    /// A body whose length is known before serialization starts.
    Full(Bytes),
    /// A lazily produced body, framed with chunked transfer encoding.
    Stream(BodyStream),
}

impl Body {
    pub fn empty() -> Self {
        Body::Empty
    }

    pub fn full<B: Into<Bytes>>(bytes: B) -> Self {
        Body::Full(bytes.into())
    }

    /// Creates a stream body together with the sender that feeds it.
    pub fn channel() -> (BodySender, Body) {
        let (sender, stream) = body_channel(PayloadSize::Chunked);
        (sender, Body::Stream(stream))
    }

    /// The wire framing this body is serialized with.
    pub fn payload_size(&self) -> PayloadSize {
        match self {
            Body::Empty => PayloadSize::Empty,
            Body::Full(bytes) if bytes.is_empty() => PayloadSize::Empty,
            Body::Full(bytes) => PayloadSize::Length(bytes.len() as u64),
            Body::Stream(_) => PayloadSize::Chunked,
        }
    }

    #[inline]
    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    /// Returns the bytes of an empty or fixed body, `None` for a stream.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Empty => Some(&[]),
            Body::Full(bytes) => Some(bytes),
            Body::Stream(_) => None,
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Full(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Full(bytes.into())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Full(s.into())
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Body::Full(Bytes::from_static(s.as_bytes()))
    }
}

impl From<BodyStream> for Body {
    fn from(stream: BodyStream) -> Self {
        Body::Stream(stream)
    }
}

impl http_body::Body for Body {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match this {
            Body::Empty => Poll::Ready(None),
            Body::Full(_) => match std::mem::take(this) {
                Body::Full(bytes) if !bytes.is_empty() => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                _ => Poll::Ready(None),
            },
            Body::Stream(stream) => stream.poll_chunk(cx).map(|item| item.map(|result| result.map(Frame::data))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Full(bytes) => bytes.is_empty(),
            Body::Stream(stream) => stream.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Body::Empty => SizeHint::with_exact(0),
            Body::Full(bytes) => SizeHint::with_exact(bytes.len() as u64),
            Body::Stream(_) => SizeHint::new(),
        }
    }
}
