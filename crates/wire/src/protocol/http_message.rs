//! Shared view over requests and responses for the serializer.

use bytes::{BufMut, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue, Request, Response, Version};

use crate::protocol::body::Body;
use crate::protocol::{PayloadSize, SendError};

/// An http message that can be written to the wire.
///
/// Implemented for `http::Request<Body>` and `http::Response<Body>`, so the same
/// serializer drives both the client and the server side.
pub trait HttpMessage {
    /// Writes the request line or status line, including the trailing CRLF.
    fn encode_first_line(&self, dst: &mut BytesMut) -> Result<(), SendError>;

    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn body(&self) -> &Body;

    fn body_mut(&mut self) -> &mut Body;

    fn into_body(self) -> Body;

    /// Replaces the body and re-derives the framing header for it.
    fn set_body(&mut self, body: Body) {
        let payload_size = body.payload_size();
        *self.body_mut() = body;
        update_transport_headers(self.headers_mut(), payload_size);
    }
}

/// Makes `Content-Length` and `Transfer-Encoding` agree with `payload_size`.
///
/// A chunked payload gets `Transfer-Encoding: chunked` and loses any
/// `Content-Length`; every other payload gets an exact `Content-Length` and
/// loses any `Transfer-Encoding`.
pub fn update_transport_headers(headers: &mut HeaderMap, payload_size: PayloadSize) {
    match payload_size {
        PayloadSize::Chunked => {
            headers.remove(CONTENT_LENGTH);
            headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        }
        PayloadSize::Length(length) => {
            headers.remove(TRANSFER_ENCODING);
            headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        }
        PayloadSize::Empty => {
            headers.remove(TRANSFER_ENCODING);
            headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        }
    }
}

fn version_str(version: Version) -> Result<&'static str, SendError> {
    match version {
        Version::HTTP_11 => Ok("HTTP/1.1"),
        Version::HTTP_10 => Ok("HTTP/1.0"),
        v => Err(SendError::UnsupportedVersion(v)),
    }
}

impl HttpMessage for Request<Body> {
    fn encode_first_line(&self, dst: &mut BytesMut) -> Result<(), SendError> {
        let version = version_str(self.version())?;
        let target = self.uri().path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let target = if target.is_empty() { "/" } else { target };

        dst.put_slice(self.method().as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(target.as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(version.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }

    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        Request::headers_mut(self)
    }

    fn body(&self) -> &Body {
        Request::body(self)
    }

    fn body_mut(&mut self) -> &mut Body {
        Request::body_mut(self)
    }

    fn into_body(self) -> Body {
        Request::into_body(self)
    }
}

impl HttpMessage for Response<Body> {
    fn encode_first_line(&self, dst: &mut BytesMut) -> Result<(), SendError> {
        let version = version_str(self.version())?;
        let status = self.status();

        dst.put_slice(version.as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(status.as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(status.canonical_reason().unwrap_or("").as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }

    fn headers(&self) -> &HeaderMap {
        Response::headers(self)
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        Response::headers_mut(self)
    }

    fn body(&self) -> &Body {
        Response::body(self)
    }

    fn body_mut(&mut self) -> &mut Body {
        Response::body_mut(self)
    }

    fn into_body(self) -> Body {
        Response::into_body(self)
    }
}
