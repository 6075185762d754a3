use std::error::Error;
use std::future::poll_fn;
use std::sync::Arc;

use futures::StreamExt;
use http::{Request, Response, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, trace};

use crate::codec::{RequestDecoder, RequestPartDecoder};
use crate::config::WireConfig;
use crate::connection::SerializerStream;
use crate::handler::Handler;
use crate::protocol::body::Body;
use crate::protocol::demand::Subscription;
use crate::protocol::{HttpError, ParseError, SendError, is_keep_alive};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// A server side http/1.1 connection.
///
/// Requests are read through [`RequestDecoder`] and reassembled by
/// [`RequestPartDecoder`]; responses are written unit by unit through a
/// [`SerializerStream`], requesting the next unit only once the transport took the
/// previous one.
///
/// A request whose body spans more than one chunk reaches the handler before the
/// body is complete. The rest of the body is read while the handler runs, but only
/// as fast as the handler reads it. Whatever the handler leaves unread is drained
/// afterwards so the next pipelined request starts at the right byte.
///
/// Malformed input ends the connection with an error; no error response is
/// written for it.
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    writer: W,
    parts: RequestPartDecoder,
    responses: SerializerStream<Response<Body>>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, &WireConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: &WireConfig) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(
                reader,
                RequestDecoder::with_max_body_size(config.max_body_size),
                READ_BUFFER_SIZE,
            ),
            writer,
            parts: RequestPartDecoder::new(),
            responses: SerializerStream::with_config(config),
        }
    }

    /// Serves requests until the peer closes the connection, a request asks for
    /// the connection to be closed, or an error occurs.
    pub async fn process<H: Handler>(mut self, handler: Arc<H>) -> Result<(), HttpError> {
        loop {
            let Some(request) = self.read_request().await? else {
                info!("can't read more requests, shut down connection");
                return Ok(());
            };

            let keep_alive = is_keep_alive(request.version(), request.headers());
            debug!(method = %request.method(), uri = %request.uri(), keep_alive, "received request");

            let response = self.call_handler(&handler, request).await?;

            // the response may carry the request body, so it is written while the
            // unread rest of that body is drained
            tokio::try_join!(
                write_response(&mut self.writer, &mut self.responses, response),
                pump_body(&mut self.framed_read, &mut self.parts),
            )?;

            if !keep_alive {
                info!("request is not keep-alive, close connection");
                self.writer.shutdown().await.map_err(SendError::io)?;
                return Ok(());
            }
        }
    }

    async fn read_request(&mut self) -> Result<Option<Request<Body>>, HttpError> {
        loop {
            match self.framed_read.next().await {
                Some(Ok(message)) => {
                    if let Some(request) = self.parts.decode(message)? {
                        return Ok(Some(request));
                    }
                }
                Some(Err(e)) => {
                    error!(cause = %e, "can't decode request, shut down connection");
                    return Err(e.into());
                }
                None if self.framed_read.decoder().is_decoding_body() => {
                    error!("connection closed in the middle of a request");
                    return Err(ParseError::invalid_body("connection closed before the end of the body").into());
                }
                None => return Ok(None),
            }
        }
    }

    async fn call_handler<H: Handler>(&mut self, handler: &Arc<H>, request: Request<Body>) -> Result<Response<Body>, HttpError> {
        let handler_future = handler.call(request);
        let body_future = pump_body(&mut self.framed_read, &mut self.parts);
        tokio::pin!(handler_future, body_future);

        let mut body_done = false;
        let result = loop {
            select! {
                biased;
                result = &mut handler_future => break result,
                body = &mut body_future, if !body_done => {
                    body_done = true;
                    body?;
                }
            }
        };

        Ok(result.unwrap_or_else(|e| {
            let e: Box<dyn Error + Send + Sync> = e.into();
            error!(cause = %e, "handler failed, respond with internal server error");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }))
    }
}

/// Feeds the body of the request in flight, reading one wire event per unit of
/// demand from the body's consumer. A consumer that went away gets the rest of the
/// body skipped.
async fn pump_body<R>(framed_read: &mut FramedRead<R, RequestDecoder>, parts: &mut RequestPartDecoder) -> Result<(), HttpError>
where
    R: AsyncRead + Unpin,
{
    while parts.is_streaming() {
        if let Err(e) = poll_fn(|cx| parts.poll_body_demand(cx)).await {
            trace!(cause = %e, "skip request body event");
        }

        match framed_read.next().await {
            Some(Ok(message)) => {
                parts.decode(message)?;
            }
            Some(Err(e)) => {
                error!(cause = %e, "can't decode request body");
                parts.abort(ParseError::invalid_body("request body could not be decoded"));
                return Err(e.into());
            }
            None => {
                error!("connection closed in the middle of a request body");
                parts.abort(ParseError::invalid_body("connection closed before the end of the body"));
                return Err(ParseError::invalid_body("connection closed before the end of the body").into());
            }
        }
    }
    Ok(())
}

async fn write_response<W>(
    writer: &mut W,
    responses: &mut SerializerStream<Response<Body>>,
    response: Response<Body>,
) -> Result<(), HttpError>
where
    W: AsyncWrite + Unpin,
{
    responses.send(response)?;

    loop {
        responses.request(1);
        if poll_fn(|cx| responses.poll_next_unit(cx)).await?.is_none() {
            break;
        }
        writer.write_all(responses.unit()).await.map_err(SendError::io)?;
        if responses.wants_message() {
            break;
        }
    }

    writer.flush().await.map_err(SendError::io)?;
    Ok(())
}
