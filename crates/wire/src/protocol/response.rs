//! Head of a parsed response.

use http::response::Parts;
use http::{HeaderMap, Response, StatusCode, Version};

use crate::protocol::body::Body;
use crate::protocol::message::MessageHead;
use crate::protocol::request::is_keep_alive;

/// The head of an inbound response, the client side counterpart of
/// [`RequestHeader`](crate::protocol::RequestHeader).
#[derive(Debug)]
pub struct ResponseHeader {
    inner: Response<()>,
}

impl AsRef<Response<()>> for ResponseHeader {
    fn as_ref(&self) -> &Response<()> {
        &self.inner
    }
}

impl ResponseHeader {
    pub fn into_inner(self) -> Response<()> {
        self.inner
    }

    pub fn body<T>(self, body: T) -> Response<T> {
        self.inner.map(|_| body)
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the status forbids a body: informational, `204 No Content` and
    /// `304 Not Modified` responses end with their head.
    pub fn need_body(&self) -> bool {
        let status = self.status();
        !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
    }

    /// Whether the server keeps the connection open after this response.
    pub fn is_keep_alive(&self) -> bool {
        is_keep_alive(self.version(), self.headers())
    }
}

impl MessageHead for ResponseHeader {
    type Message = Response<Body>;

    fn attach_body(self, body: Body) -> Self::Message {
        self.body(body)
    }
}

impl From<Parts> for ResponseHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Response::from_parts(parts, ()) }
    }
}

impl From<Response<()>> for ResponseHeader {
    #[inline]
    fn from(inner: Response<()>) -> Self {
        Self { inner }
    }
}
