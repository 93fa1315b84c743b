use std::fmt::Display;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::{FutureExt, SinkExt, StreamExt};
use http::{HeaderMap, HeaderValue, Response, StatusCode, header};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::header::is_chunked;
use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::connection::ConnectionConfig;
use crate::handler::{BoxError, Handler};
use crate::protocol::body::ReqBody;
use crate::protocol::{
    CompletionNotifier, HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError,
    completion_channel, response_wants_close,
};

type ResponseMessage = Message<(ResponseHead, PayloadSize)>;

/// Where a connection is in its request/response cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Waiting for, or reading, the next request head.
    AwaitingRequest,
    /// A handler owns the request; its body is streamed on demand.
    Dispatching,
    /// The response is being written.
    Responding,
    Closed,
}

/// Serves HTTP/1.1 requests over one byte stream.
///
/// Requests are handled strictly one after another: the next head is only
/// read once the previous response has been flushed, and the inbound body of
/// a request is always consumed before its response goes out. The connection
/// stays open between requests unless the client or the handler asks for it
/// to be closed, the request is HTTP/1.0, or something went wrong.
///
/// # Type Parameters
///
/// * `R`: the readable half of the stream
/// * `W`: the writable half of the stream
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    config: ConnectionConfig,
    stage: Stage,
    close_after_response: bool,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, ConnectionConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: ConnectionConfig) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::with_config(&config), config.read_buffer_size()),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            config,
            stage: Stage::AwaitingRequest,
            close_after_response: false,
        }
    }

    /// Serves requests until the peer goes away or the connection has to close.
    pub async fn process<H>(self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler<ReqBody>,
        H::RespBody: Body + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        self.process_until(handler, CancellationToken::new()).await
    }

    /// Like [`process`](Self::process), but stops once `shutdown` is cancelled.
    ///
    /// A request whose handler is still running at that point is answered with
    /// `500 Internal Server Error` on a best effort basis. The writer is shut
    /// down before returning either way.
    pub async fn process_until<H>(mut self, handler: Arc<H>, shutdown: CancellationToken) -> Result<(), HttpError>
    where
        H: Handler<ReqBody>,
        H::RespBody: Body + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        let served = select! {
            result = self.serve(&handler) => Some(result),
            () = shutdown.cancelled() => None,
        };

        let result = match served {
            Some(result) => result,
            None => {
                info!(stage = ?self.stage, "connection interrupted by shutdown");
                self.abort_in_flight().await;
                Ok(())
            }
        };

        self.stage = Stage::Closed;
        // flushes whatever a failed response left buffered before shutting down
        if let Err(e) = SinkExt::<ResponseMessage>::close(&mut self.framed_write).await {
            debug!(cause = %e, "failed to shut down connection writer");
        }
        result
    }

    async fn serve<H>(&mut self, handler: &Arc<H>) -> Result<(), HttpError>
    where
        H: Handler<ReqBody>,
        H::RespBody: Body + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        loop {
            self.stage = Stage::AwaitingRequest;
            let next = match self.config.idle_timeout() {
                Some(idle_timeout) => match tokio::time::timeout(idle_timeout, self.framed_read.next()).await {
                    Ok(next) => next,
                    Err(_elapsed) => {
                        debug!(?idle_timeout, "no request within the idle timeout, closing connection");
                        return Ok(());
                    }
                },
                None => self.framed_read.next().await,
            };

            match next {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    self.do_process(header, payload_size, handler).await?;
                    if self.close_after_response {
                        debug!("response asked for the connection to close");
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("received body bytes while expecting a request head");
                    self.send_bad_request(None).await;
                    return Err(ParseError::invalid_body("received body bytes while expecting a request head").into());
                }

                Some(Err(ParseError::Io { source })) if is_disconnect(&source) => {
                    debug!(cause = %source, "peer went away");
                    return Ok(());
                }

                Some(Err(e)) => {
                    warn!(cause = %e, "can't receive next request");
                    self.send_bad_request(e.client_detail()).await;
                    return Err(e.into());
                }

                None => {
                    debug!("peer closed the connection");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process<H>(&mut self, header: RequestHeader, payload_size: PayloadSize, handler: &Arc<H>) -> Result<(), HttpError>
    where
        H: Handler<ReqBody>,
        H::RespBody: Body + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        self.close_after_response = header.wants_close();
        if header.expects_continue() && !payload_size.is_empty() {
            self.send_continue().await?;
        }

        let (notifier, completion) = completion_channel();
        let (mut body_sender, req_body) = ReqBody::body_channel(&mut self.framed_read, payload_size);
        let mut request = header.body(req_body);
        request.extensions_mut().insert(completion);
        self.stage = Stage::Dispatching;

        // The handler and the body sender run side by side: the handler may
        // wait on body bytes that only the sender can read off the socket.
        let handled = {
            tokio::pin! {
                let handler_future = AssertUnwindSafe(handler.call(request)).catch_unwind();
                let body_sender_future = body_sender.start();
            }

            let mut body_done = false;
            let handled = loop {
                select! {
                    biased;
                    handled = &mut handler_future => break handled,
                    () = &mut body_sender_future, if !body_done => body_done = true,
                }
            };
            handled.map(|result| result.map_err(Into::<BoxError>::into))
        };

        let drained = body_sender.drain().await;
        drop(body_sender);

        match (drained, handled) {
            (Err(e), _) if e.is_malformed() => {
                warn!(cause = %e, "malformed request body");
                self.close_after_response = true;
                self.send_error(StatusCode::BAD_REQUEST, e.client_detail(), Some(notifier)).await
            }
            (Err(e), _) => {
                warn!(cause = %e, "failed to read request body");
                notifier.fail(&e);
                Err(e.into())
            }
            (Ok(()), Ok(Ok(response))) => self.send_response(response, notifier).await,
            (Ok(()), Ok(Err(e))) => {
                error!(cause = %e, "handler failed");
                self.send_error(StatusCode::INTERNAL_SERVER_ERROR, None, Some(notifier)).await
            }
            (Ok(()), Err(_panic)) => {
                error!("handler panicked");
                self.send_error(StatusCode::INTERNAL_SERVER_ERROR, None, Some(notifier)).await
            }
        }
    }

    async fn send_continue(&mut self) -> Result<(), SendError> {
        let writer = self.framed_write.get_mut();
        writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
        writer.flush().await?;
        debug!("sent 100 continue");
        Ok(())
    }

    async fn send_response<B>(&mut self, response: Response<B>, notifier: CompletionNotifier) -> Result<(), HttpError>
    where
        B: Body + Unpin,
        B::Error: Display,
    {
        let (parts, body) = response.into_parts();
        let payload_size = match response_payload_size(&parts.headers, &body) {
            Ok(payload_size) => payload_size,
            Err(e) => {
                error!(cause = %e, "handler produced an unusable response head");
                return self.send_error(StatusCode::INTERNAL_SERVER_ERROR, None, Some(notifier)).await;
            }
        };

        self.finish_response(ResponseHead::from_parts(parts, ()), payload_size, body, Some(notifier)).await
    }

    async fn send_error(
        &mut self,
        status: StatusCode,
        detail: Option<String>,
        notifier: Option<CompletionNotifier>,
    ) -> Result<(), HttpError> {
        let mut head = ResponseHead::new(());
        *head.status_mut() = status;

        let body = match detail {
            Some(detail) => {
                head.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
                Bytes::from(detail)
            }
            None => Bytes::new(),
        };
        let payload_size = PayloadSize::new_length(body.len() as u64);
        self.finish_response(head, payload_size, Full::new(body), notifier).await
    }

    /// Answers a request that could not be parsed, then gives up on the connection.
    async fn send_bad_request(&mut self, detail: Option<String>) {
        self.close_after_response = true;
        if let Err(e) = self.send_error(StatusCode::BAD_REQUEST, detail, None).await {
            debug!(cause = %e, "failed to answer a malformed request");
        }
    }

    async fn abort_in_flight(&mut self) {
        if self.stage != Stage::Dispatching {
            return;
        }

        self.close_after_response = true;
        if let Err(e) = self.send_error(StatusCode::INTERNAL_SERVER_ERROR, None, None).await {
            debug!(cause = %e, "failed to answer the interrupted request");
        }
    }

    async fn finish_response<B>(
        &mut self,
        mut head: ResponseHead,
        payload_size: PayloadSize,
        body: B,
        notifier: Option<CompletionNotifier>,
    ) -> Result<(), HttpError>
    where
        B: Body + Unpin,
        B::Error: Display,
    {
        if response_wants_close(head.headers()) {
            self.close_after_response = true;
        } else if self.close_after_response {
            head.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("close"));
        }

        self.stage = Stage::Responding;
        match self.write_response(head, payload_size, body).await {
            Ok(()) => {
                if let Some(notifier) = notifier {
                    notifier.succeed();
                }
                Ok(())
            }
            Err(e) => {
                error!(cause = %e, "failed to send response");
                if let Some(notifier) = notifier {
                    notifier.fail(&e);
                }
                self.close_after_response = true;
                Err(e.into())
            }
        }
    }

    async fn write_response<B>(&mut self, head: ResponseHead, payload_size: PayloadSize, mut body: B) -> Result<(), SendError>
    where
        B: Body + Unpin,
        B::Error: Display,
    {
        let header = Message::<_, B::Data>::Header((head, payload_size));
        if payload_size.is_empty() {
            // send flushes, there is nothing after the head
            return self.framed_write.send(header).await;
        }
        self.framed_write.feed(header).await?;

        loop {
            match body.frame().await {
                Some(Ok(frame)) => {
                    // trailers are not forwarded
                    if let Ok(data) = frame.into_data() {
                        self.framed_write.feed(Message::Payload(PayloadItem::Chunk(data))).await?;
                    }
                }
                Some(Err(e)) => return Err(SendError::invalid_body(e.to_string())),
                None => return self.framed_write.send(Message::Payload(PayloadItem::<B::Data>::Eof)).await,
            }
        }
    }
}

/// Decides how a response body is framed.
///
/// An explicit chunked coding or `Content-Length` from the handler wins;
/// otherwise a body of known size gets a `Content-Length` and anything else is
/// sent chunked.
fn response_payload_size<B: Body>(headers: &HeaderMap, body: &B) -> Result<PayloadSize, SendError> {
    if headers.get(header::TRANSFER_ENCODING).is_some_and(is_chunked) {
        return Ok(PayloadSize::Chunked);
    }

    if let Some(value) = headers.get(header::CONTENT_LENGTH) {
        let length = value
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .ok_or_else(|| SendError::invalid_body(format!("invalid content-length {value:?}")))?;
        return Ok(PayloadSize::new_length(length));
    }

    if body.is_end_stream() {
        return Ok(PayloadSize::Empty);
    }
    Ok(body.size_hint().into())
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}
