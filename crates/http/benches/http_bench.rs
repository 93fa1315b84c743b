use std::convert::Infallible;
use std::hint::black_box;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use criterion::{Criterion, criterion_group, criterion_main};
use http::{Request, Response, StatusCode};
use restline_http::codec::body::PayloadDecoder;
use restline_http::codec::{RequestDecoder, ResponseEncoder};
use restline_http::connection::HttpConnection;
use restline_http::handler::from_fn;
use restline_http::protocol::body::ReqBody;
use restline_http::protocol::{Message, PayloadItem, PayloadSize, ResponseHead};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::runtime::Runtime;
use tokio_util::codec::{Decoder, Encoder};

/// Replays a fixed byte string as the read side and discards everything written.
struct ReplayIo {
    read_data: Bytes,
}

impl AsyncRead for ReplayIo {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let amt = self.read_data.len().min(buf.remaining());
        let chunk = self.read_data.split_to(amt);
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ReplayIo {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

async fn hello(_req: Request<ReqBody>) -> Result<Response<String>, Infallible> {
    Ok(Response::new("Hello World!".to_owned()))
}

fn bench_request_decoder(c: &mut Criterion) {
    let request = b"GET /users/42 HTTP/1.1\r\nHost: localhost\r\nAccept: */*\r\nUser-Agent: bench\r\n\r\n";

    c.bench_function("decode_simple_request", |b| {
        b.iter(|| {
            let mut decoder = RequestDecoder::new();
            let mut bytes = BytesMut::from(&request[..]);
            black_box(decoder.decode(&mut bytes).unwrap());
        });
    });
}

fn bench_chunked_body(c: &mut Criterion) {
    let mut body = Vec::new();
    for _ in 0..64 {
        body.extend_from_slice(b"400\r\n");
        body.extend(std::iter::repeat_n(b'x', 0x400));
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(b"0\r\n\r\n");

    c.bench_function("decode_chunked_body", |b| {
        b.iter(|| {
            let mut decoder = PayloadDecoder::new(PayloadSize::Chunked, 4 * 1024);
            let mut bytes = BytesMut::from(&body[..]);
            while let Some(PayloadItem::Chunk(chunk)) = decoder.decode(&mut bytes).unwrap() {
                black_box(chunk);
            }
        });
    });
}

fn bench_response_encoder(c: &mut Criterion) {
    c.bench_function("encode_simple_response", |b| {
        b.iter(|| {
            let mut encoder = ResponseEncoder::new();
            let mut bytes = BytesMut::new();
            let mut head = ResponseHead::new(());
            *head.status_mut() = StatusCode::OK;
            encoder.encode(Message::<_, Bytes>::Header((head, PayloadSize::Length(12))), &mut bytes).unwrap();
            encoder.encode(Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"Hello World!"))), &mut bytes).unwrap();
            encoder.encode(Message::Payload(PayloadItem::<Bytes>::Eof), &mut bytes).unwrap();
            black_box(bytes);
        });
    });
}

fn bench_http_connection(c: &mut Criterion) {
    let requests = Bytes::from(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n".repeat(16));
    let handler = Arc::new(from_fn(hello));
    let runtime = Runtime::new().unwrap();

    c.bench_function("process_keep_alive_requests", |b| {
        b.to_async(&runtime).iter(|| {
            let reader = ReplayIo { read_data: requests.clone() };
            let writer = ReplayIo { read_data: Bytes::new() };
            let handler = Arc::clone(&handler);
            async move { black_box(HttpConnection::new(reader, writer).process(handler).await.unwrap()) }
        });
    });
}

criterion_group!(benches, bench_request_decoder, bench_chunked_body, bench_response_encoder, bench_http_connection);
criterion_main!(benches);
