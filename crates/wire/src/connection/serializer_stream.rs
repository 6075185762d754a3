use std::mem;
use std::task::{Context, Poll, Waker, ready};

use tracing::{error, trace};

use crate::buffer::WriteBuffer;
use crate::codec::HttpSerializer;
use crate::config::WireConfig;
use crate::protocol::body::BodyStream;
use crate::protocol::demand::{Demand, Subscriber, Subscription};
use crate::protocol::{HttpMessage, SendError};

#[derive(Debug)]
enum StreamState {
    /// No message in flight.
    Idle,
    /// The serializer can make progress on its own; holds the body stream to pull
    /// from once it runs out of chunks.
    Writing(Option<BodyStream>),
    /// The serializer waits for the next chunk of this stream.
    ChunkedStreamReady(BodyStream),
    Cancelled,
}

/// The outbound stage: http messages in, byte units out, one unit per demand.
///
/// Units are staged in a fixed [`WriteBuffer`] that is reused for every unit. A
/// unit is handed out when the buffer is full, when the serializer has to wait
/// for the next body chunk, or when a message is complete, so a slow body never
/// holds back bytes that are already serialized.
///
/// The unit returned by [`SerializerStream::unit`] is only valid until the next
/// call into the stage.
#[derive(Debug)]
pub struct SerializerStream<M> {
    serializer: HttpSerializer<M>,
    buffer: WriteBuffer,
    demand: Demand,
    state: StreamState,
    closed: bool,
    waker: Option<Waker>,
}

impl<M: HttpMessage> SerializerStream<M> {
    pub fn new(write_buffer_size: usize) -> Self {
        Self {
            serializer: HttpSerializer::new(),
            buffer: WriteBuffer::with_capacity(write_buffer_size),
            demand: Demand::new(),
            state: StreamState::Idle,
            closed: false,
            waker: None,
        }
    }

    pub fn with_config(config: &WireConfig) -> Self {
        Self::new(config.write_buffer_size)
    }

    /// Queues the next message. Only accepted while [`SerializerStream::wants_message`].
    pub fn send(&mut self, message: M) -> Result<(), SendError> {
        match self.state {
            StreamState::Cancelled => return Err(SendError::Cancelled),
            StreamState::Idle if !self.closed => {}
            StreamState::Idle => return Err(SendError::StreamClosed),
            StreamState::Writing(_) | StreamState::ChunkedStreamReady(_) => {
                error!("message sent while the previous one is still being serialized");
                return Err(SendError::invalid_body("previous message is still being serialized"));
            }
        }

        let body = self.serializer.set_message(message)?;
        self.state = StreamState::Writing(body);
        self.wake();
        Ok(())
    }

    /// Whether [`SerializerStream::send`] would accept a message now.
    #[inline]
    pub fn wants_message(&self) -> bool {
        matches!(self.state, StreamState::Idle) && !self.closed
    }

    /// No more messages follow; the stage ends once the current one is written.
    pub fn close(&mut self) {
        self.closed = true;
        self.wake();
    }

    /// The bytes of the unit last returned by [`SerializerStream::poll_next_unit`].
    #[inline]
    pub fn unit(&self) -> &[u8] {
        self.buffer.filled()
    }

    #[inline]
    pub fn demand(&self) -> u64 {
        self.demand.outstanding()
    }

    /// Produces the next unit and returns its length, or `None` once the stage is
    /// closed and everything is written.
    ///
    /// Stays pending while there is no demand, no message, or the body has no
    /// chunk ready; [`Subscription::request`] and [`SerializerStream::send`] wake
    /// the task again. After an error or [`Subscription::cancel`] every call fails
    /// with [`SendError::Cancelled`].
    pub fn poll_next_unit(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<usize>, SendError>> {
        if matches!(self.state, StreamState::Cancelled) {
            return Poll::Ready(Err(SendError::Cancelled));
        }
        if !self.demand.has_demand() {
            self.waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        // the previous unit was delivered by now
        self.buffer.clear();

        loop {
            // a failure below leaves the stage cancelled
            match mem::replace(&mut self.state, StreamState::Cancelled) {
                StreamState::Cancelled => return Poll::Ready(Err(SendError::Cancelled)),

                StreamState::Idle => {
                    self.state = StreamState::Idle;
                    if !self.buffer.is_empty() {
                        return self.deliver();
                    }
                    if self.closed {
                        trace!("serializer stream closed");
                        return Poll::Ready(Ok(None));
                    }
                    self.waker = Some(cx.waker().clone());
                    return Poll::Pending;
                }

                StreamState::Writing(mut body) => {
                    let n = self.serializer.serialize_into(self.buffer.unfilled_mut())?;
                    self.buffer.advance(n);

                    if self.serializer.ready() {
                        trace!("message serialized");
                        self.state = StreamState::Idle;
                        if self.buffer.is_empty() {
                            continue;
                        }
                        return self.deliver();
                    }

                    if self.buffer.is_full() {
                        self.state = StreamState::Writing(body);
                        return self.deliver();
                    }

                    let Some(stream) = body.take() else {
                        error!("serializer waits for a body chunk without a body stream");
                        return Poll::Ready(Err(SendError::invalid_body("missing body stream")));
                    };
                    self.state = StreamState::ChunkedStreamReady(stream);
                    if !self.buffer.is_empty() {
                        return self.deliver();
                    }
                }

                StreamState::ChunkedStreamReady(mut stream) => match stream.poll_chunk(cx) {
                    Poll::Pending => {
                        self.state = StreamState::ChunkedStreamReady(stream);
                        return Poll::Pending;
                    }
                    Poll::Ready(Some(Ok(chunk))) => {
                        trace!(len = chunk.len(), "pulled body chunk");
                        self.serializer.push_chunk(chunk)?;
                        self.state = StreamState::Writing(Some(stream));
                    }
                    Poll::Ready(None) => {
                        self.serializer.finish_body()?;
                        self.state = StreamState::Writing(None);
                    }
                    Poll::Ready(Some(Err(e))) => {
                        error!(cause = %e, "body stream failed");
                        self.serializer.reset();
                        return Poll::Ready(Err(SendError::invalid_body(e)));
                    }
                },
            }
        }
    }

    /// Delivers units to `downstream` for as long as it has demand.
    ///
    /// Resolves once a terminal signal was delivered.
    pub fn poll_produce<S>(&mut self, cx: &mut Context<'_>, downstream: &mut S) -> Poll<()>
    where
        S: for<'a> Subscriber<&'a [u8], Error = SendError>,
    {
        loop {
            match ready!(self.poll_next_unit(cx)) {
                Ok(Some(_)) => downstream.on_next(self.buffer.filled()),
                Ok(None) => {
                    downstream.on_close();
                    return Poll::Ready(());
                }
                Err(e) => {
                    downstream.on_error(e);
                    return Poll::Ready(());
                }
            }
        }
    }

    fn deliver(&mut self) -> Poll<Result<Option<usize>, SendError>> {
        self.demand.consume();
        trace!(len = self.buffer.len(), demand = self.demand.outstanding(), "deliver unit");
        Poll::Ready(Ok(Some(self.buffer.len())))
    }

    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

impl<M: HttpMessage> Subscription for SerializerStream<M> {
    fn request(&mut self, n: u64) {
        if n == 0 {
            return;
        }
        self.demand.request(n);
        self.wake();
    }

    fn cancel(&mut self) {
        if matches!(self.state, StreamState::Cancelled) {
            return;
        }
        trace!("serializer stream cancelled");
        // dropping the body stream cancels its producer
        self.state = StreamState::Cancelled;
        self.serializer.reset();
        self.buffer.clear();
        self.demand.reset();
        self.waker = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::body::Body;
    use bytes::Bytes;
    use futures::task::noop_waker_ref;
    use http::Response;

    fn cx() -> Context<'static> {
        Context::from_waker(noop_waker_ref())
    }

    fn next_unit(stream: &mut SerializerStream<Response<Body>>) -> Option<Vec<u8>> {
        match stream.poll_next_unit(&mut cx()) {
            Poll::Ready(Ok(Some(_))) => Some(stream.unit().to_vec()),
            Poll::Ready(Ok(None)) => None,
            Poll::Ready(Err(e)) => panic!("unexpected error: {e}"),
            Poll::Pending => panic!("unexpected pending"),
        }
    }

    #[test]
    fn streamed_body_units_follow_demand() {
        let (mut sender, body) = Body::channel();
        let mut stream = SerializerStream::new(1024);
        stream.send(Response::new(body)).unwrap();

        assert!(stream.poll_next_unit(&mut cx()).is_pending());

        stream.request(1);
        assert_eq!(next_unit(&mut stream).unwrap(), b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n");
        assert!(stream.poll_next_unit(&mut cx()).is_pending());

        for (chunk, expected) in [(&b"hello"[..], &b"5\r\nhello\r\n"[..]), (&b"test"[..], &b"4\r\ntest\r\n"[..])] {
            stream.request(1);
            // the body has not produced anything yet
            assert!(stream.poll_next_unit(&mut cx()).is_pending());
            assert!(matches!(sender.poll_ready(&mut cx()), Poll::Ready(Ok(()))));
            sender.push(Bytes::copy_from_slice(chunk)).unwrap();
            assert_eq!(next_unit(&mut stream).unwrap(), expected);
        }

        stream.request(1);
        assert!(stream.poll_next_unit(&mut cx()).is_pending());
        sender.close();
        assert_eq!(next_unit(&mut stream).unwrap(), b"0\r\n\r\n");

        stream.request(1);
        assert!(stream.wants_message());
        assert!(stream.poll_next_unit(&mut cx()).is_pending());
        stream.close();
        assert_eq!(next_unit(&mut stream), None);
    }

    #[test]
    fn small_buffer_splits_into_units() {
        let expected = b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\n\r\nhello world";
        let mut stream = SerializerStream::new(8);
        stream.send(Response::new(Body::full("hello world"))).unwrap();

        let mut units = Vec::new();
        while !stream.wants_message() {
            stream.request(1);
            units.push(next_unit(&mut stream).unwrap());
        }

        assert!(units.iter().all(|unit| !unit.is_empty() && unit.len() <= 8));
        assert_eq!(units.len(), expected.len().div_ceil(8));
        assert_eq!(units.concat(), expected.to_vec());
    }

    #[test]
    fn at_most_n_units_per_request() {
        let mut stream = SerializerStream::new(4);
        stream.send(Response::new(Body::full("0123456789"))).unwrap();

        stream.request(0);
        assert!(stream.poll_next_unit(&mut cx()).is_pending());

        stream.request(2);
        assert!(next_unit(&mut stream).is_some());
        assert!(next_unit(&mut stream).is_some());
        assert!(stream.poll_next_unit(&mut cx()).is_pending());
        assert_eq!(stream.demand(), 0);
    }

    #[test]
    fn one_message_at_a_time() {
        let mut stream = SerializerStream::new(64);
        stream.send(Response::new(Body::empty())).unwrap();
        assert!(!stream.wants_message());
        assert!(matches!(stream.send(Response::new(Body::empty())), Err(SendError::InvalidBody { .. })));
    }

    #[test]
    fn send_after_close_is_rejected() {
        let mut stream = SerializerStream::new(64);
        stream.close();
        assert!(!stream.wants_message());
        assert!(matches!(stream.send(Response::new(Body::empty())), Err(SendError::StreamClosed)));
    }

    #[test]
    fn cancel_releases_the_body_stream() {
        let (mut sender, body) = Body::channel();
        let mut stream = SerializerStream::new(1024);
        stream.send(Response::new(body)).unwrap();
        stream.request(2);
        next_unit(&mut stream).unwrap();
        assert!(stream.poll_next_unit(&mut cx()).is_pending());

        stream.cancel();
        stream.cancel();

        assert!(matches!(sender.poll_ready(&mut cx()), Poll::Ready(Err(SendError::Cancelled))));
        assert!(matches!(stream.poll_next_unit(&mut cx()), Poll::Ready(Err(SendError::Cancelled))));
        assert!(matches!(stream.send(Response::new(Body::empty())), Err(SendError::Cancelled)));
    }

    #[derive(Default)]
    struct Collect {
        units: Vec<Vec<u8>>,
        closed: bool,
        error: Option<SendError>,
    }

    impl<'a> Subscriber<&'a [u8]> for Collect {
        type Error = SendError;

        fn on_next(&mut self, item: &'a [u8]) {
            self.units.push(item.to_vec());
        }

        fn on_error(&mut self, error: Self::Error) {
            self.error = Some(error);
        }

        fn on_close(&mut self) {
            self.closed = true;
        }
    }

    #[test]
    fn produce_into_subscriber() {
        let mut stream = SerializerStream::new(16);
        let mut downstream = Collect::default();
        stream.send(Response::new(Body::full("abc"))).unwrap();
        stream.close();

        assert!(stream.poll_produce(&mut cx(), &mut downstream).is_pending());
        assert!(downstream.units.is_empty());

        stream.request(u64::MAX);
        assert!(stream.poll_produce(&mut cx(), &mut downstream).is_ready());
        assert_eq!(downstream.units.concat(), b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\nabc".to_vec());
        assert!(downstream.closed);
        assert!(downstream.error.is_none());
    }

    #[test]
    fn failing_body_is_reported_once() {
        let (mut sender, body) = Body::channel();
        let mut stream = SerializerStream::new(1024);
        let mut downstream = Collect::default();
        stream.send(Response::new(body)).unwrap();
        stream.request(u64::MAX);

        assert!(stream.poll_produce(&mut cx(), &mut downstream).is_pending());
        sender.error(crate::protocol::ParseError::invalid_body("upstream failed"));

        assert!(stream.poll_produce(&mut cx(), &mut downstream).is_ready());
        assert_eq!(downstream.units.len(), 1);
        assert!(matches!(downstream.error, Some(SendError::InvalidBody { .. })));
        assert!(!downstream.closed);
    }
}
