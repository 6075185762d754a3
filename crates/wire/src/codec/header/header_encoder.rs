//! Serializes the header block of an outbound message.

use bytes::{BufMut, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderName, HeaderValue};
use tokio_util::codec::Encoder;

use crate::protocol::{HttpMessage, PayloadSize, SendError};

/// Writes `Name: value\r\n` lines for every header of a message.
///
/// Names are written in Title-Case. The framing header is derived from the
/// [`PayloadSize`] rather than trusted from the message: the first
/// `Content-Length` or `Transfer-Encoding` line is replaced by the derived one
/// in place, any further ones are dropped, and if there was none the derived
/// header is appended last. The blank line ending the block is not written here.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl<M: HttpMessage> Encoder<(&M, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (&M, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (message, payload_size) = item;
        let (framing_name, framing_value) = framing_header(payload_size);

        let mut framing_written = false;
        for (name, value) in message.headers() {
            if *name == CONTENT_LENGTH || *name == TRANSFER_ENCODING {
                if !framing_written {
                    put_header(dst, &framing_name, &framing_value);
                    framing_written = true;
                }
                continue;
            }
            put_header(dst, name, value);
        }

        if !framing_written {
            put_header(dst, &framing_name, &framing_value);
        }
        Ok(())
    }
}

fn framing_header(payload_size: PayloadSize) -> (HeaderName, HeaderValue) {
    match payload_size {
        PayloadSize::Length(length) => (CONTENT_LENGTH, HeaderValue::from(length)),
        PayloadSize::Empty => (CONTENT_LENGTH, HeaderValue::from_static("0")),
        PayloadSize::Chunked => (TRANSFER_ENCODING, HeaderValue::from_static("chunked")),
    }
}

fn put_header(dst: &mut BytesMut, name: &HeaderName, value: &HeaderValue) {
    let name = name.as_str().as_bytes();
    let value = value.as_bytes();
    dst.reserve(name.len() + value.len() + 4);

    put_title_case(dst, name);
    dst.put_slice(b": ");
    dst.put_slice(value);
    dst.put_slice(b"\r\n");
}

fn put_title_case(dst: &mut BytesMut, name: &[u8]) {
    let mut upper = true;
    for &b in name {
        dst.put_u8(if upper { b.to_ascii_uppercase() } else { b });
        upper = b == b'-';
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::body::Body;
    use http::Response;

    fn encode(response: &Response<Body>, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((response, payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn empty_body_gets_zero_length() {
        let response = Response::new(Body::empty());
        assert_eq!(encode(&response, PayloadSize::Empty), "Content-Length: 0\r\n");
    }

    #[test]
    fn names_are_title_cased_in_insertion_order() {
        let response = Response::builder()
            .header("x-request-id", "42")
            .header("content-type", "text/plain")
            .header("server", "micro-wire")
            .body(Body::full("hi"))
            .unwrap();

        assert_eq!(
            encode(&response, PayloadSize::Length(2)),
            "X-Request-Id: 42\r\nContent-Type: text/plain\r\nServer: micro-wire\r\nContent-Length: 2\r\n"
        );
    }

    #[test]
    fn framing_header_replaced_in_place() {
        let response = Response::builder()
            .header("date", "today")
            .header("content-length", "999")
            .header("transfer-encoding", "gzip")
            .header("vary", "accept")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            encode(&response, PayloadSize::Chunked),
            "Date: today\r\nTransfer-Encoding: chunked\r\nVary: accept\r\n"
        );
    }

    #[test]
    fn repeated_values_are_kept() {
        let response = Response::builder()
            .header("set-cookie", "a=1")
            .header("set-cookie", "b=2")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            encode(&response, PayloadSize::Empty),
            "Set-Cookie: a=1\r\nSet-Cookie: b=2\r\nContent-Length: 0\r\n"
        );
    }

    #[test]
    fn repeated_names_are_grouped() {
        let response = Response::builder()
            .header("x-a", "1")
            .header("x-b", "2")
            .header("x-a", "3")
            .body(Body::empty())
            .unwrap();

        assert_eq!(encode(&response, PayloadSize::Empty), "X-A: 1\r\nX-A: 3\r\nX-B: 2\r\nContent-Length: 0\r\n");
    }
}
