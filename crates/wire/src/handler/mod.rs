//! Request handlers driven by [`HttpConnection`](crate::connection::HttpConnection).

use std::error::Error;
use std::future::Future;

use async_trait::async_trait;
use http::{Request, Response};

use crate::protocol::body::Body;

/// Turns a request into a response.
///
/// The request body may still be arriving while the handler runs; reading it is
/// what lets the connection read more of it from the wire.
#[async_trait]
pub trait Handler: Send + Sync {
    type Error: Into<Box<dyn Error + Send + Sync>>;

    async fn call(&self, request: Request<Body>) -> Result<Response<Body>, Self::Error>;
}

/// A [`Handler`] backed by an async function, see [`make_handler`].
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut, B, Err> Handler for HandlerFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response<B>, Err>> + Send,
    B: Into<Body> + Send,
    Err: Into<Box<dyn Error + Send + Sync>> + Send,
{
    type Error = Err;

    async fn call(&self, request: Request<Body>) -> Result<Response<Body>, Self::Error> {
        let response = (self.f)(request).await?;
        Ok(response.map(Into::into))
    }
}

/// Wraps an async function as a [`Handler`]. The response body can be anything
/// that converts into a [`Body`].
pub fn make_handler<F, Fut, B, Err>(f: F) -> HandlerFn<F>
where
    F: Fn(Request<Body>) -> Fut,
    Fut: Future<Output = Result<Response<B>, Err>>,
    B: Into<Body>,
{
    HandlerFn { f }
}
