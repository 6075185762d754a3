//! Reassembles head / body chunk / end events into requests and responses.

use std::mem;
use std::task::{Context, Poll};

use bytes::Bytes;
use tracing::{error, trace};

use crate::protocol::body::{Body, BodySender, body_channel};
use crate::protocol::{Message, MessageHead, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHeader, SendError};

/// Where the adapter is within the current message.
#[derive(Debug)]
pub enum ParserState<H> {
    /// Between messages.
    Ready,
    /// Head seen, no body bytes yet.
    AwaitingBody(H),
    /// Exactly one body chunk seen, held back until it is clear whether more follow.
    AwaitingEnd(H, Bytes),
    /// The message was emitted with a stream body that is still being fed.
    StreamingBody(BodySender),
}

impl<H> Default for ParserState<H> {
    fn default() -> Self {
        ParserState::Ready
    }
}

impl<H> ParserState<H> {
    fn name(&self) -> &'static str {
        match self {
            ParserState::Ready => "ready",
            ParserState::AwaitingBody(_) => "awaiting body",
            ParserState::AwaitingEnd(..) => "awaiting end",
            ParserState::StreamingBody(_) => "streaming body",
        }
    }
}

/// Turns the events of [`RequestDecoder`](crate::codec::RequestDecoder) or
/// [`ResponseDecoder`](crate::codec::ResponseDecoder) into `Request<Body>` or
/// `Response<Body>` values.
///
/// Most messages have no body or a single chunk of it, so the first chunk is held
/// back and the message is emitted at `end` with an empty or full body. Only when
/// a second chunk arrives is the message emitted early with a stream body, fed
/// with both held chunks and everything after, so its reader can start before
/// the body is complete.
#[derive(Debug)]
pub struct PartDecoder<H> {
    state: ParserState<H>,
    payload_size: Option<PayloadSize>,
}

pub type RequestPartDecoder = PartDecoder<RequestHeader>;

pub type ResponsePartDecoder = PartDecoder<ResponseHeader>;

impl<H> Default for PartDecoder<H> {
    fn default() -> Self {
        Self { state: ParserState::Ready, payload_size: None }
    }
}

impl<H: MessageHead> PartDecoder<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one wire event, returning the message once it can be emitted.
    ///
    /// Any event that does not fit the current state is an
    /// [`ParseError::UnexpectedState`]; the adapter is back in
    /// [`ParserState::Ready`] afterwards.
    pub fn decode(&mut self, message: Message<(H, PayloadSize)>) -> Result<Option<H::Message>, ParseError> {
        let state = mem::take(&mut self.state);

        let emitted = match (state, message) {
            (ParserState::Ready, Message::Header((header, payload_size))) => {
                self.payload_size = Some(payload_size);
                self.state = ParserState::AwaitingBody(header);
                None
            }

            (ParserState::AwaitingBody(header), Message::Payload(PayloadItem::Chunk(chunk))) => {
                self.state = ParserState::AwaitingEnd(header, chunk);
                None
            }

            (ParserState::AwaitingEnd(header, first), Message::Payload(PayloadItem::Chunk(second))) => {
                trace!("more than one body chunk, switch to a stream body");
                let (mut sender, stream) = body_channel(self.payload_size.unwrap_or(PayloadSize::Chunked));
                feed(&mut sender, first)?;
                feed(&mut sender, second)?;
                self.state = ParserState::StreamingBody(sender);
                Some(header.attach_body(Body::Stream(stream)))
            }

            (ParserState::StreamingBody(mut sender), Message::Payload(PayloadItem::Chunk(chunk))) => {
                feed(&mut sender, chunk)?;
                self.state = ParserState::StreamingBody(sender);
                None
            }

            (ParserState::AwaitingBody(header), Message::Payload(PayloadItem::Eof)) => {
                Some(header.attach_body(Body::Empty))
            }

            (ParserState::AwaitingEnd(header, chunk), Message::Payload(PayloadItem::Eof)) => {
                Some(header.attach_body(Body::Full(chunk)))
            }

            (ParserState::StreamingBody(mut sender), Message::Payload(PayloadItem::Eof)) => {
                sender.close();
                None
            }

            (state, message) => {
                let event = if message.is_header() { "head" } else { "body" };
                error!(state = state.name(), event, "unexpected message event");
                return Err(ParseError::unexpected_state(state.name(), event));
            }
        };

        if matches!(self.state, ParserState::Ready) {
            self.payload_size = None;
        }
        Ok(emitted)
    }

    /// Whether an emitted message's body is still being fed.
    #[inline]
    pub fn is_streaming(&self) -> bool {
        matches!(self.state, ParserState::StreamingBody(_))
    }

    #[inline]
    pub fn state(&self) -> &ParserState<H> {
        &self.state
    }

    /// Resolves once the next wire event may be read.
    ///
    /// While a stream body is being fed this waits until the body's consumer has
    /// taken everything queued and asked for more. A consumer that went away
    /// resolves to [`SendError::Cancelled`]; the remaining events are then
    /// dropped as they are decoded.
    pub fn poll_body_demand(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), SendError>> {
        match &mut self.state {
            ParserState::StreamingBody(sender) => sender.poll_ready(cx),
            _ => Poll::Ready(Ok(())),
        }
    }

    /// Fails the body in flight, if any, and starts over.
    pub fn abort(&mut self, error: ParseError) {
        if let ParserState::StreamingBody(mut sender) = mem::take(&mut self.state) {
            sender.error(error);
        }
        self.payload_size = None;
    }
}

fn feed(sender: &mut BodySender, chunk: Bytes) -> Result<(), ParseError> {
    sender.push(chunk).map_err(ParseError::invalid_body)
}
