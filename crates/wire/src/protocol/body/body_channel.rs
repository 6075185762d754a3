use std::future::poll_fn;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use tracing::{error, trace};

use crate::protocol::demand::{Demand, DemandSignal, Subscription};
use crate::protocol::{ParseError, PayloadItem, PayloadSize, SendError};

/// Creates a connected body producer and consumer.
pub fn body_channel(payload_size: PayloadSize) -> (BodySender, BodyStream) {
    let (signal_sender, signal_receiver) = mpsc::unbounded();
    let (data_sender, data_receiver) = mpsc::unbounded();

    (
        BodySender { signal_receiver, data_sender, demand: Demand::new(), backlog: 0, closed: false, cancelled: false },
        BodyStream { signal_sender, data_receiver, requested: 0, payload_size, done: false },
    )
}

/// Producer side of a stream body.
#[derive(Debug)]
pub struct BodySender {
    signal_receiver: mpsc::UnboundedReceiver<DemandSignal>,
    data_sender: mpsc::UnboundedSender<Result<PayloadItem, ParseError>>,
    demand: Demand,
    // chunks queued ahead of demand, settled by the next requests
    backlog: u64,
    closed: bool,
    cancelled: bool,
}

impl BodySender {
    /// Resolves once the consumer has requested a chunk that was not delivered yet.
    ///
    /// Resolves to [`SendError::Cancelled`] once the consumer cancelled or went
    /// away, and to [`SendError::BodyAlreadyClosed`] after [`BodySender::close`].
    pub fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), SendError>> {
        if self.closed {
            return Poll::Ready(Err(SendError::BodyAlreadyClosed));
        }

        self.poll_signals(cx);

        if self.cancelled {
            return Poll::Ready(Err(SendError::Cancelled));
        }

        if self.demand.has_demand() { Poll::Ready(Ok(())) } else { Poll::Pending }
    }

    /// Waits for demand, then delivers `chunk`.
    pub async fn send_data(&mut self, chunk: Bytes) -> Result<(), SendError> {
        poll_fn(|cx| self.poll_ready(cx)).await?;
        self.push(chunk)
    }

    /// Feeds one chunk into the stream.
    ///
    /// A chunk pushed without outstanding demand stays queued in the channel until
    /// the consumer asks for it, and the next requests are counted against it, so
    /// [`BodySender::poll_ready`] only resolves again once that backlog is taken.
    /// Chunks pushed after the consumer cancelled are dropped.
    pub fn push(&mut self, chunk: Bytes) -> Result<(), SendError> {
        if self.closed {
            error!("body chunk pushed after the body stream was closed");
            return Err(SendError::BodyAlreadyClosed);
        }

        if self.cancelled || chunk.is_empty() {
            return Ok(());
        }

        if !self.demand.try_consume() {
            self.backlog += 1;
            trace!(len = chunk.len(), backlog = self.backlog, "queue body chunk ahead of demand");
        }

        if self.data_sender.unbounded_send(Ok(PayloadItem::Chunk(chunk))).is_err() {
            self.cancelled = true;
        }
        Ok(())
    }

    /// Ends the stream after everything pushed so far. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // a consumer that is gone no longer cares about the end of the body
        let _ = self.data_sender.unbounded_send(Ok(PayloadItem::Eof));
    }

    /// Terminates the stream with an error. Ignored once the stream is closed.
    pub fn error(&mut self, error: ParseError) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.data_sender.unbounded_send(Err(error));
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled || self.data_sender.is_closed()
    }

    fn poll_signals(&mut self, cx: &mut Context<'_>) {
        while !self.cancelled {
            match self.signal_receiver.poll_next_unpin(cx) {
                Poll::Ready(Some(DemandSignal::Request(n))) => {
                    let settled = n.min(self.backlog);
                    self.backlog -= settled;
                    self.demand.request(n - settled);
                }
                Poll::Ready(Some(DemandSignal::Cancel) | None) => {
                    trace!("body consumer cancelled");
                    self.cancelled = true;
                    self.backlog = 0;
                    self.demand.reset();
                }
                Poll::Pending => break,
            }
        }
    }
}

/// Consumer side of a stream body.
///
/// Polling requests one chunk at a time unless more was granted through
/// [`Subscription::request`]. Dropping the stream cancels the producer.
#[derive(Debug)]
pub struct BodyStream {
    signal_sender: mpsc::UnboundedSender<DemandSignal>,
    data_receiver: mpsc::UnboundedReceiver<Result<PayloadItem, ParseError>>,
    requested: u64,
    payload_size: PayloadSize,
    done: bool,
}

impl BodyStream {
    pub fn poll_chunk(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<Bytes, ParseError>>> {
        if self.done {
            return Poll::Ready(None);
        }

        if self.requested == 0 {
            self.request(1);
        }

        let item = ready!(self.data_receiver.poll_next_unpin(cx));
        Poll::Ready(match item {
            Some(Ok(PayloadItem::Chunk(bytes))) => {
                self.requested = self.requested.saturating_sub(1);
                Some(Ok(bytes))
            }
            Some(Ok(PayloadItem::Eof)) => {
                self.done = true;
                None
            }
            Some(Err(e)) => {
                self.done = true;
                Some(Err(e))
            }
            None => {
                self.done = true;
                Some(Err(ParseError::invalid_body("body sender dropped before the end of the body")))
            }
        })
    }

    #[inline]
    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }

    #[inline]
    pub fn is_end_stream(&self) -> bool {
        self.done
    }
}

impl Subscription for BodyStream {
    fn request(&mut self, n: u64) {
        if n == 0 || self.done {
            return;
        }
        self.requested = self.requested.saturating_add(n);
        // the sender being gone shows up as a closed data channel on the next poll
        let _ = self.signal_sender.unbounded_send(DemandSignal::Request(n));
    }

    fn cancel(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        let _ = self.signal_sender.unbounded_send(DemandSignal::Cancel);
        self.data_receiver.close();
    }
}

impl Stream for BodyStream {
    type Item = Result<Bytes, ParseError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_chunk(cx)
    }
}

impl Drop for BodyStream {
    fn drop(&mut self) {
        self.cancel();
    }
}
