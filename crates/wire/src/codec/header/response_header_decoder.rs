//! Response head parsing on top of `httparse`, with the same limits as the
//! request side.

use std::mem::MaybeUninit;

use bytes::BytesMut;
use http::{Response, StatusCode};
use httparse::{Error, ParserConfig, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::header::header_decoder::{HeaderIndex, append_headers, is_chunked, parse_content_length};
use crate::codec::header::{MAX_HEADER_BYTES, MAX_HEADER_NUM};
use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, ResponseHeader};

/// How a response body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFraming {
    /// `Content-Length`, chunked, or no body at all.
    Payload(PayloadSize),
    /// Neither framing header: the body runs until the server closes the
    /// connection.
    UntilClose,
}

/// Decodes a response head and works out how its body is delimited, see
/// [RFC 9112 section 6.3](https://www.rfc-editor.org/rfc/rfc9112#section-6.3).
///
/// Responses to `HEAD` requests are not told apart; their framing headers are
/// taken at face value.
#[derive(Debug, Clone, Copy)]
pub struct ResponseHeaderDecoder {
    max_body_size: u64,
}

impl ResponseHeaderDecoder {
    pub fn new(max_body_size: u64) -> Self {
        Self { max_body_size }
    }
}

impl Decoder for ResponseHeaderDecoder {
    type Item = (ResponseHeader, ResponseFraming);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // shortest possible head is "HTTP/1.1 200\r\n\r\n"
        if src.len() < 16 {
            return Ok(None);
        }

        let mut resp = httparse::Response::new(&mut []);
        let mut headers: [MaybeUninit<httparse::Header<'_>>; MAX_HEADER_NUM] = [const { MaybeUninit::uninit() }; MAX_HEADER_NUM];

        let parsed_result =
            ParserConfig::default().parse_response_with_uninit_headers(&mut resp, src, &mut headers).map_err(|e| match e {
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

        trace!(head_size = body_offset, "parsed response head");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let header_count = resp.headers.len();
        let mut header_index = [HeaderIndex::EMPTY; MAX_HEADER_NUM];
        HeaderIndex::record(src, resp.headers, &mut header_index);

        let version = match resp.version {
            Some(0) => http::Version::HTTP_10,
            Some(1) => http::Version::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };
        let status = resp
            .code
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or_else(|| ParseError::invalid_header("invalid status code"))?;

        let mut builder = Response::builder().status(status).version(version);

        let head = src.split_to(body_offset).freeze();
        if let Some(headers) = builder.headers_mut() {
            append_headers(&head, &header_index[..header_count], headers)?;
        }

        let header = ResponseHeader::from(builder.body(()).map_err(ParseError::invalid_header)?);
        let framing = parse_framing(&header, self.max_body_size)?;

        Ok(Some((header, framing)))
    }
}

fn parse_framing(header: &ResponseHeader, max_body_size: u64) -> Result<ResponseFraming, ParseError> {
    if !header.need_body() {
        return Ok(ResponseFraming::Payload(PayloadSize::new_empty()));
    }

    let te_header = header.headers().get(http::header::TRANSFER_ENCODING);
    let cl_header = header.headers().get(http::header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        (Some(te_value), None) if is_chunked(te_value) => Ok(ResponseFraming::Payload(PayloadSize::new_chunked())),
        (Some(_), None) | (None, None) => Ok(ResponseFraming::UntilClose),
        (None, Some(cl_value)) => parse_content_length(cl_value, max_body_size).map(ResponseFraming::Payload),
        (Some(_), Some(_)) => {
            Err(ParseError::invalid_content_length("transfer-encoding and content-length both present in headers"))
        }
    }
}
