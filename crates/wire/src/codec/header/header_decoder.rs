//! Request head parsing on top of `httparse`.
//!
//! Limits: at most [`MAX_HEADER_NUM`] headers and [`MAX_HEADER_BYTES`] bytes for
//! the whole head. Only HTTP/1.0 and HTTP/1.1 are accepted.
//!
//! Header names and values are not copied out of the input: their byte ranges are
//! recorded while `httparse` borrows the buffer, then sliced out of the frozen
//! head once the borrow ends.

use std::mem::MaybeUninit;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Request};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

pub const MAX_HEADER_NUM: usize = 64;

pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decodes a request head and works out how its body is framed.
///
/// A `Content-Length` above `max_body_size` is rejected here, before any of the
/// body is read.
#[derive(Debug, Clone, Copy)]
pub struct HeaderDecoder {
    max_body_size: u64,
}

impl HeaderDecoder {
    pub fn new(max_body_size: u64) -> Self {
        Self { max_body_size }
    }
}

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // shortest possible head is "GET / HTTP/1.1\r\n\r\n"
        if src.len() < 14 {
            return Ok(None);
        }

        let mut req = httparse::Request::new(&mut []);
        let mut headers: [MaybeUninit<httparse::Header<'_>>; MAX_HEADER_NUM] = [const { MaybeUninit::uninit() }; MAX_HEADER_NUM];

        let parsed_result = req.parse_with_uninit_headers(src, &mut headers).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        let body_offset = match parsed_result? {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };

        trace!(head_size = body_offset, "parsed request head");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let header_count = req.headers.len();
        let mut header_index = [HeaderIndex::EMPTY; MAX_HEADER_NUM];
        HeaderIndex::record(src, req.headers, &mut header_index);

        let version = match req.version {
            Some(0) => http::Version::HTTP_10,
            Some(1) => http::Version::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };

        let mut builder = Request::builder()
            .method(req.method.ok_or(ParseError::InvalidMethod)?)
            .uri(req.path.ok_or(ParseError::InvalidUri)?)
            .version(version);

        let head = src.split_to(body_offset).freeze();
        if let Some(headers) = builder.headers_mut() {
            append_headers(&head, &header_index[..header_count], headers)?;
        }

        let header = RequestHeader::from(builder.body(()).map_err(|e| match e {
            e if e.is::<http::uri::InvalidUri>() => ParseError::InvalidUri,
            e if e.is::<http::method::InvalidMethod>() => ParseError::InvalidMethod,
            e => ParseError::invalid_header(e),
        })?);
        let payload_size = parse_payload(&header, self.max_body_size)?;

        Ok(Some((header, payload_size)))
    }
}

/// Byte ranges of one header's name and value inside the head buffer.
#[derive(Clone, Copy)]
pub(super) struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

impl HeaderIndex {
    pub(super) const EMPTY: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

    pub(super) fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, index) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            index.name = (name_start, name_start + header.name.len());
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            index.value = (value_start, value_start + header.value.len());
        }
    }
}

/// Copies the recorded headers out of the frozen head without copying bytes.
pub(super) fn append_headers(head: &Bytes, indices: &[HeaderIndex], headers: &mut HeaderMap) -> Result<(), ParseError> {
    headers.reserve(indices.len());
    for index in indices {
        let name = HeaderName::from_bytes(&head[index.name.0..index.name.1]).map_err(ParseError::invalid_header)?;
        let value =
            HeaderValue::from_maybe_shared(head.slice(index.value.0..index.value.1)).map_err(ParseError::invalid_header)?;
        headers.append(name, value);
    }
    Ok(())
}

/// Works out the body framing, see
/// [RFC 9112 section 6.3](https://www.rfc-editor.org/rfc/rfc9112#section-6.3).
fn parse_payload(header: &RequestHeader, max_body_size: u64) -> Result<PayloadSize, ParseError> {
    if !header.need_body() {
        return Ok(PayloadSize::new_empty());
    }

    let te_header = header.headers().get(http::header::TRANSFER_ENCODING);
    let cl_header = header.headers().get(http::header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) => Ok(PayloadSize::new_empty()),

        (Some(te_value), None) => {
            if is_chunked(te_value) {
                Ok(PayloadSize::new_chunked())
            } else {
                Ok(PayloadSize::new_empty())
            }
        }

        (None, Some(cl_value)) => parse_content_length(cl_value, max_body_size),

        (Some(_), Some(_)) => {
            Err(ParseError::invalid_content_length("transfer-encoding and content-length both present in headers"))
        }
    }
}

/// A `Content-Length` above `max_body_size` is rejected before any body byte is read.
pub(super) fn parse_content_length(value: &HeaderValue, max_body_size: u64) -> Result<PayloadSize, ParseError> {
    let cl_str = value.to_str().map_err(ParseError::invalid_content_length)?;
    let length = cl_str
        .trim()
        .parse::<u64>()
        .map_err(|e| ParseError::invalid_content_length(format!("value {cl_str} is not u64: {e}")))?;

    ensure!(length <= max_body_size, ParseError::too_large_body(length, max_body_size));

    Ok(if length == 0 { PayloadSize::new_empty() } else { PayloadSize::new_length(length) })
}

/// Chunked must be the last transfer coding applied.
pub(super) fn is_chunked(value: &HeaderValue) -> bool {
    value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Version};
    use indoc::indoc;

    const NO_LIMIT: u64 = u64::MAX;

    fn decode(input: &str, max_body_size: u64) -> Result<Option<(RequestHeader, PayloadSize)>, ParseError> {
        let mut buf = BytesMut::from(input);
        HeaderDecoder::new(max_body_size).decode(&mut buf)
    }

    #[test]
    fn check_is_chunked() {
        assert!(is_chunked(&HeaderValue::from_static("gzip, chunked")));
        assert!(is_chunked(&HeaderValue::from_static("Chunked")));
        assert!(!is_chunked(&HeaderValue::from_static("chunked, gzip")));
        assert!(!is_chunked(&HeaderValue::from_static("gzip")));
    }

    #[test]
    fn leaves_body_bytes_in_buffer() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        123"##};

        let mut bytes = BytesMut::from(str);
        let result = HeaderDecoder::new(NO_LIMIT).decode(&mut bytes).unwrap();

        assert!(result.is_some());
        assert_eq!(&bytes[..], &b"123"[..]);
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let (header, payload_size) = decode(str, NO_LIMIT).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().path(), "/index.html");
        assert_eq!(header.uri().query(), None);
        assert_eq!(header.headers().len(), 3);
        assert_eq!(header.headers().get(http::header::HOST).unwrap(), "127.0.0.1:8080");
        assert_eq!(header.headers().get(http::header::USER_AGENT).unwrap(), "curl/7.79.1");
    }

    #[test]
    fn from_edge() {
        let str = indoc! {r##"
        GET /index/?a=1&b=2&a=3 HTTP/1.1
        Host: 127.0.0.1:8080
        Connection: keep-alive
        Cache-Control: max-age=0
        sec-ch-ua: "#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109"
        sec-ch-ua-mobile: ?0
        sec-ch-ua-platform: "macOS"
        Upgrade-Insecure-Requests: 1
        User-Agent: Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36 Edg/109.0.1518.52
        Accept: text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9
        Sec-Fetch-Site: none
        Sec-Fetch-Mode: navigate
        Sec-Fetch-User: ?1
        Sec-Fetch-Dest: document
        Accept-Encoding: gzip, deflate, br
        Accept-Language: zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7

        "##};

        let (header, payload_size) = decode(str, NO_LIMIT).unwrap().unwrap();

        assert!(payload_size.is_empty());
        assert!(header.is_keep_alive());
        assert_eq!(header.uri().path(), "/index/");
        assert_eq!(header.uri().query(), Some("a=1&b=2&a=3"));
        assert_eq!(header.headers().len(), 15);
        assert_eq!(
            header.headers().get("sec-ch-ua").unwrap(),
            r##""#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109""##
        );
        assert_eq!(header.headers().get("sec-ch-ua-platform").unwrap(), "\"macOS\"");
        assert_eq!(header.headers().get(http::header::ACCEPT_LANGUAGE).unwrap(), "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7");
    }

    #[test]
    fn partial_head_needs_more() {
        assert!(decode("POST /upload HTTP/1.1\r\nHost: a\r\n", NO_LIMIT).unwrap().is_none());
    }

    #[test]
    fn content_length_framing() {
        let (_, payload_size) = decode("POST / HTTP/1.1\r\nContent-Length: 12\r\n\r\n", NO_LIMIT).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Length(12));

        let (_, payload_size) = decode("POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n", NO_LIMIT).unwrap().unwrap();
        assert!(payload_size.is_empty());
    }

    #[test]
    fn chunked_framing() {
        let (_, payload_size) =
            decode("POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n", NO_LIMIT).unwrap().unwrap();
        assert!(payload_size.is_chunked());
    }

    #[test]
    fn content_length_over_limit() {
        let result = decode("POST / HTTP/1.1\r\nContent-Length: 11\r\n\r\n", 10);
        assert!(matches!(result, Err(ParseError::TooLargeBody { current_size: 11, max_size: 10 })));

        assert!(decode("POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\n", 10).unwrap().is_some());
    }

    #[test]
    fn conflicting_framing_headers() {
        let result =
            decode("POST / HTTP/1.1\r\nContent-Length: 3\r\nTransfer-Encoding: chunked\r\n\r\n", NO_LIMIT);
        assert!(matches!(result, Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn invalid_content_length() {
        let result = decode("POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n", NO_LIMIT);
        assert!(matches!(result, Err(ParseError::InvalidContentLength { .. })));
    }

    #[test]
    fn oversized_head() {
        let mut head = String::from("GET / HTTP/1.1\r\nX-Filler: ");
        head.push_str(&"a".repeat(MAX_HEADER_BYTES));
        assert!(matches!(decode(&head, NO_LIMIT), Err(ParseError::TooLargeHeader { .. })));
    }
}
