use std::convert::Infallible;
use std::hint::black_box;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use criterion::{Criterion, criterion_group, criterion_main};
use futures::executor::block_on;
use futures::task::noop_waker_ref;
use http::{Request, Response};
use http_body_util::BodyExt;
use micro_wire::codec::{FrameDecoder, FrameEncoder, RequestDecoder, RequestPartDecoder, ResponseSerializer};
use micro_wire::connection::HttpConnection;
use micro_wire::handler::make_handler;
use micro_wire::protocol::body::Body;
use micro_wire::protocol::frame::Frame;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::codec::{Decoder, Encoder};

// Mock IO for benchmarking
#[derive(Clone)]
struct MockIO {
    read_data: Vec<u8>,
    read_pos: usize,
}

impl MockIO {
    fn new(read_data: Vec<u8>) -> Self {
        Self { read_data, read_pos: 0 }
    }
}

impl AsyncRead for MockIO {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let remaining = &self.read_data[self.read_pos..];
        let amt = std::cmp::min(remaining.len(), buf.remaining());
        buf.put_slice(&remaining[..amt]);
        self.read_pos += amt;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockIO {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, io::Error>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }
}

fn bench_frame_decoder(c: &mut Criterion) {
    let mut wire = BytesMut::new();
    FrameEncoder.encode(Frame::binary(vec![7u8; 4096]).with_mask([1, 2, 3, 4]), &mut wire).unwrap();
    let wire = wire.freeze();

    c.bench_function("decode_masked_4k_frame", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::default();
            let mut bytes = BytesMut::from(&wire[..]);
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });
}

fn bench_serializer(c: &mut Criterion) {
    c.bench_function("serialize_response_into_1k_units", |b| {
        let mut serializer = ResponseSerializer::new();
        let mut buf = vec![0u8; 1024];
        b.iter(|| {
            let response = Response::builder()
                .header("content-type", "text/plain")
                .body(Body::full(Bytes::from_static(&[b'x'; 8192])))
                .unwrap();
            serializer.set_message(response).unwrap();
            while !serializer.ready() {
                black_box(serializer.serialize_into(&mut buf).unwrap());
            }
        });
    });
}

/// Many tiny chunks: the held back first chunk turns into a stream body on the
/// second one and every further chunk goes through the body channel.
fn bench_one_byte_chunks(c: &mut Criterion) {
    let mut request = b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    for _ in 0..512 {
        request.extend_from_slice(b"1\r\nx\r\n");
    }
    request.extend_from_slice(b"0\r\n\r\n");

    c.bench_function("request_with_512_one_byte_chunks", |b| {
        b.iter(|| {
            let mut cx = Context::from_waker(noop_waker_ref());
            let mut bytes = BytesMut::from(&request[..]);
            let mut tokenizer = RequestDecoder::new();
            let mut parts = RequestPartDecoder::new();
            let mut body = None;

            while let Some(message) = tokenizer.decode(&mut bytes).unwrap() {
                if let Some(request) = parts.decode(message).unwrap() {
                    body = Some(request.into_body());
                }
                if let Some(Body::Stream(stream)) = &mut body {
                    while let Poll::Ready(Some(chunk)) = stream.poll_chunk(&mut cx) {
                        black_box(chunk.unwrap());
                    }
                }
            }
        });
    });
}

fn bench_http_connection(c: &mut Criterion) {
    let request = b"POST /echo HTTP/1.1\r\nHost: localhost\r\nContent-Length: 12\r\n\r\nHello World!";
    let handler = Arc::new(make_handler(|request: Request<Body>| async move {
        let body = request.into_body().collect().await.unwrap().to_bytes();
        Ok::<_, Infallible>(Response::new(body))
    }));

    c.bench_function("process_echo_request", |b| {
        b.iter(|| {
            let mock_io = MockIO::new(request.to_vec());
            let connection = HttpConnection::new(mock_io.clone(), mock_io);
            black_box(block_on(connection.process(Arc::clone(&handler))).unwrap());
        });
    });
}

criterion_group!(benches, bench_frame_decoder, bench_serializer, bench_one_byte_chunks, bench_http_connection);
criterion_main!(benches);
