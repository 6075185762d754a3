//! Head of a parsed request, before its body is known.

use http::header::CONNECTION;
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

use crate::protocol::body::Body;
use crate::protocol::message::MessageHead;

/// The head of an inbound request.
///
/// Wraps an `http::Request<()>` until the parser adapter has decided what kind
/// of [`Body`](crate::protocol::body::Body) to attach.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body, turning the head into a full request.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Whether the method may carry a body at all.
    ///
    /// GET, HEAD, DELETE, OPTIONS and CONNECT requests are treated as bodyless
    /// regardless of their framing headers.
    pub fn need_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }

    /// Whether the connection may be reused after this request.
    pub fn is_keep_alive(&self) -> bool {
        is_keep_alive(self.version(), self.headers())
    }
}

/// HTTP/1.1 keeps the connection unless told `close`, HTTP/1.0 closes it unless
/// told `keep-alive`.
pub fn is_keep_alive(version: Version, headers: &HeaderMap) -> bool {
    let has_token = |token: &str| {
        headers.get_all(CONNECTION).iter().any(|value| {
            value.to_str().map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token))).unwrap_or(false)
        })
    };

    match version {
        Version::HTTP_11 => !has_token("close"),
        Version::HTTP_10 => has_token("keep-alive"),
        _ => false,
    }
}

impl MessageHead for RequestHeader {
    type Message = Request<Body>;

    fn attach_body(self, body: Body) -> Self::Message {
        self.body(body)
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn header(version: Version, connection: Option<&'static str>) -> RequestHeader {
        let mut builder = Request::builder().method(Method::GET).uri("/").version(version);
        if let Some(value) = connection {
            builder = builder.header(CONNECTION, HeaderValue::from_static(value));
        }
        builder.body(()).unwrap().into()
    }

    #[test]
    fn http11_defaults_to_keep_alive() {
        assert!(header(Version::HTTP_11, None).is_keep_alive());
        assert!(header(Version::HTTP_11, Some("keep-alive")).is_keep_alive());
        assert!(!header(Version::HTTP_11, Some("close")).is_keep_alive());
        assert!(!header(Version::HTTP_11, Some("Upgrade, Close")).is_keep_alive());
    }

    #[test]
    fn http10_needs_explicit_keep_alive() {
        assert!(!header(Version::HTTP_10, None).is_keep_alive());
        assert!(header(Version::HTTP_10, Some("Keep-Alive")).is_keep_alive());
    }

    #[test]
    fn bodyless_methods() {
        let get: RequestHeader = Request::builder().method(Method::GET).body(()).unwrap().into();
        let post: RequestHeader = Request::builder().method(Method::POST).body(()).unwrap().into();
        assert!(!get.need_body());
        assert!(post.need_body());
    }

    #[test]
    fn attach_body() {
        let head = header(Version::HTTP_11, None);
        let request = head.body("payload");
        assert_eq!(*request.body(), "payload");
        assert_eq!(request.uri().path(), "/");
    }
}
