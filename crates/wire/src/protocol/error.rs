use std::io;

use http::Version;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("body size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeBody { current_size: u64, max_size: u64 },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("unexpected {event} while {state}")]
    UnexpectedState { state: &'static str, event: &'static str },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn too_large_body(current_size: u64, max_size: u64) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }

    pub fn unexpected_state(state: &'static str, event: &'static str) -> Self {
        Self::UnexpectedState { state, event }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("serialization requested without an active message")]
    NoActiveMessage,

    #[error("body data pushed after the body stream was closed")]
    BodyAlreadyClosed,

    #[error("unsupported http version: {0:?}")]
    UnsupportedVersion(Version),

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("message sent after the stream was closed")]
    StreamClosed,

    #[error("the consumer cancelled the stream")]
    Cancelled,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Malformed or oversized websocket input. Every variant is fatal for the frame.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    #[error("control frame length {length} exceeds 125")]
    FrameTooLarge { length: u64 },

    #[error("invalid frame parameters: {reason}")]
    InvalidFrameParameters { reason: String },

    #[error("payload size {size} exceed the limit {max_size}")]
    InvalidBufferSize { size: u64, max_size: u64 },

    #[error("frame is not masked")]
    MissingMask,

    #[error("input closed with {buffered} bytes of an incomplete frame")]
    IncompleteFrame { buffered: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl FrameError {
    pub fn invalid_frame_parameters<S: ToString>(str: S) -> Self {
        Self::InvalidFrameParameters { reason: str.to_string() }
    }

    pub fn invalid_buffer_size(size: u64, max_size: u64) -> Self {
        Self::InvalidBufferSize { size, max_size }
    }
}
