//! Demand driven http/1.1 and websocket wire codecs
//!
//! This crate turns raw byte streams into structured messages and structured
//! messages back into bytes, one bounded unit at a time. Nothing is produced that
//! a consumer did not ask for first, so a slow peer never makes it buffer an
//! unbounded amount of data.
//!
//! # Features
//!
//! - Incremental http/1.1 serialization of requests and responses into fixed
//!   size buffers, with `Content-Length` or chunked bodies
//! - Inbound request parsing with pipelining, keep-alive and body size limits
//! - Response parsing for clients, through the same head / body / end adapter
//! - Request bodies that reach the handler while they are still arriving
//! - RFC 6455 websocket frame decoding and encoding, including masking and
//!   fragmentation flags
//! - A request/cancel backpressure protocol shared by every stage
//!
//! # Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::sync::Arc;
//!
//! use http::{Request, Response};
//! use micro_wire::connection::HttpConnection;
//! use micro_wire::handler::make_handler;
//! use micro_wire::protocol::body::Body;
//! use tokio::net::TcpListener;
//! use tracing::{Level, error, info, warn};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
//!         eprintln!("setting default subscriber failed: {e}");
//!     }
//!
//!     info!(port = 8080, "start listening");
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (tcp_stream, _remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             match HttpConnection::new(reader, writer).process(handler).await {
//!                 Ok(()) => info!("finished process, connection shutdown"),
//!                 Err(e) => error!(cause = %e, "service has error, connection shutdown"),
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: Request<Body>) -> Result<Response<String>, Infallible> {
//!     info!(path = request.uri().path(), "receive request");
//!     Ok(Response::new("Hello World!\r\n".to_string()))
//! }
//! ```
//!
//! Websocket frames work the same way below the connection level:
//!
//! ```
//! use bytes::BytesMut;
//! use micro_wire::codec::FrameDecoder;
//! use micro_wire::protocol::frame::OpCode;
//! use tokio_util::codec::Decoder;
//!
//! let mut bytes = BytesMut::from(&[0x81, 0x05, b'H', b'e', b'l', b'l', b'o'][..]);
//! let frame = FrameDecoder::default().decode(&mut bytes).unwrap().unwrap();
//!
//! assert_eq!(frame.opcode(), OpCode::Text);
//! assert_eq!(&frame.payload[..], b"Hello");
//! ```
//!
//! # Architecture
//!
//! - [`buffer`]: fixed capacity staging buffers and the segment copy helper
//! - [`protocol`]: messages, bodies, frames, errors and the demand protocol
//! - [`codec`]: the pure state machines, no io
//! - [`connection`]: demand driven stages and the http connection driver
//! - [`handler`]: request handler traits
//! - [`config`]: size limits and buffer sizes
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - No websocket extensions, reserved bits are passed through untouched
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64

pub mod buffer;
pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
