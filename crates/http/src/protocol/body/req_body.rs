use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, Stream, StreamExt};
use http_body::{Body, Frame, SizeHint};
use tracing::{debug, error, warn};

use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

pub(crate) enum BodyRequestSignal {
    RequestData,
}

/// The body of an inbound request, streamed straight off the connection.
///
/// Every poll asks the connection for the next segment, so nothing is read from
/// the socket until someone asks for it. Framing errors found while reading
/// surface as `Err` frames.
///
/// The body may outlive the handler, for example when it is moved into a
/// spawned task. The connection then keeps serving it, and holds the response
/// back, until it has been read to the end or dropped.
#[derive(Debug)]
pub struct ReqBody {
    // `None` once finished, so the connection stops waiting for requests
    signal_sender: Option<mpsc::Sender<BodyRequestSignal>>,
    data_receiver: mpsc::Receiver<Result<PayloadItem, ParseError>>,
    payload_size: PayloadSize,
    in_flight: bool,
}

impl ReqBody {
    /// Creates the producer/consumer pair for one request body.
    pub(crate) fn body_channel<S>(payload_stream: &mut S, payload_size: PayloadSize) -> (BodySender<'_, S>, ReqBody)
    where
        S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
    {
        let (signal_sender, signal_receiver) = mpsc::channel(8);
        let (data_sender, data_receiver) = mpsc::channel(8);

        let sender = BodySender { payload_stream, signal_receiver, data_sender, requested: false, eof: false, failure: None };
        (sender, ReqBody::new(signal_sender, data_receiver, payload_size))
    }

    /// A body with no bytes, handy for building requests outside a connection.
    pub fn empty() -> Self {
        let (signal_sender, _) = mpsc::channel(1);
        let (_, data_receiver) = mpsc::channel(1);
        Self::new(signal_sender, data_receiver, PayloadSize::Empty)
    }

    fn new(
        signal_sender: mpsc::Sender<BodyRequestSignal>,
        data_receiver: mpsc::Receiver<Result<PayloadItem, ParseError>>,
        payload_size: PayloadSize,
    ) -> Self {
        let signal_sender = (!payload_size.is_empty()).then_some(signal_sender);
        Self { signal_sender, data_receiver, payload_size, in_flight: false }
    }

    fn finish(&mut self) {
        self.signal_sender = None;
        self.in_flight = false;
    }
}

fn connection_gone() -> ParseError {
    ParseError::io(io::Error::new(io::ErrorKind::ConnectionAborted, "connection stopped serving the request body"))
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let Some(signal_sender) = this.signal_sender.as_mut() else {
            return Poll::Ready(None);
        };

        if !this.in_flight {
            match signal_sender.poll_ready(cx) {
                Poll::Ready(Ok(())) => {
                    if let Err(e) = signal_sender.start_send(BodyRequestSignal::RequestData) {
                        debug!(cause = %e, "failed to ask the connection for more body");
                        this.finish();
                        return Poll::Ready(Some(Err(connection_gone())));
                    }
                    this.in_flight = true;
                }
                Poll::Ready(Err(e)) => {
                    debug!(cause = %e, "connection stopped serving the request body");
                    this.finish();
                    return Poll::Ready(Some(Err(connection_gone())));
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        match this.data_receiver.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(PayloadItem::Chunk(bytes)))) => {
                this.in_flight = false;
                Poll::Ready(Some(Ok(Frame::data(bytes))))
            }
            Poll::Ready(Some(Ok(PayloadItem::Eof))) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(Some(Err(connection_gone())))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.signal_sender.is_none()
    }

    fn size_hint(&self) -> SizeHint {
        self.payload_size.into()
    }
}

/// What went wrong while the body was streamed to the handler.
///
/// The original error is handed to the handler, the connection keeps this
/// summary to decide how the exchange ends.
#[derive(Debug)]
struct BodyFailure {
    io_kind: Option<io::ErrorKind>,
    reason: String,
}

impl BodyFailure {
    fn record(e: &ParseError) -> Self {
        match e {
            ParseError::Io { source } => Self { io_kind: Some(source.kind()), reason: source.to_string() },
            ParseError::InvalidBody { reason } => Self { io_kind: None, reason: reason.clone() },
            other => Self { io_kind: None, reason: other.to_string() },
        }
    }

    fn into_error(self) -> ParseError {
        match self.io_kind {
            Some(kind) => ParseError::io(io::Error::new(kind, self.reason)),
            None => ParseError::invalid_body(self.reason),
        }
    }
}

/// Reads body segments off the connection on behalf of a [`ReqBody`].
pub(crate) struct BodySender<'conn, S> {
    payload_stream: &'conn mut S,
    signal_receiver: mpsc::Receiver<BodyRequestSignal>,
    data_sender: mpsc::Sender<Result<PayloadItem, ParseError>>,
    // a request taken off the signal channel and not answered yet
    requested: bool,
    eof: bool,
    failure: Option<BodyFailure>,
}

impl<S> BodySender<'_, S>
where
    S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
{
    /// Serves read requests from the body until it ends, fails, or is dropped.
    ///
    /// Cancel safe: a request taken off the channel is answered by the next call.
    pub(crate) async fn start(&mut self) {
        while !self.eof && self.failure.is_none() {
            if !self.requested {
                match self.signal_receiver.next().await {
                    Some(BodyRequestSignal::RequestData) => self.requested = true,
                    None => return,
                }
            }

            match self.read_data().await {
                Ok(payload_item) => {
                    self.requested = false;
                    self.eof = payload_item.is_eof();
                    if self.data_sender.send(Ok(payload_item)).await.is_err() {
                        debug!("request body dropped while data was in flight");
                        return;
                    }
                }
                Err(e) => {
                    self.requested = false;
                    warn!(cause = %e, "failed to read request body");
                    self.failure = Some(BodyFailure::record(&e));
                    // whoever holds the body may have given up on it already
                    let _ = self.data_sender.send(Err(e)).await;
                }
            }
        }
    }

    /// Finishes the body once the handler has returned.
    ///
    /// A body still held somewhere keeps being served until it is read to the
    /// end or dropped; whatever is left after that is discarded. Returns the
    /// failure met while streaming, if any, so the connection can answer for it.
    pub(crate) async fn drain(&mut self) -> Result<(), ParseError> {
        self.start().await;
        if let Some(failure) = self.failure.take() {
            return Err(failure.into_error());
        }

        while !self.eof {
            self.eof = self.read_data().await?.is_eof();
        }
        Ok(())
    }

    async fn read_data(&mut self) -> Result<PayloadItem, ParseError> {
        match self.payload_stream.next().await {
            Some(Ok(Message::Payload(payload_item))) => Ok(payload_item),
            Some(Ok(Message::Header(_))) => {
                error!("received a request head while reading a request body");
                Err(ParseError::invalid_body("received a request head while reading a request body"))
            }
            Some(Err(e)) => Err(e),
            None => Err(ParseError::io(io::Error::from(io::ErrorKind::UnexpectedEof))),
        }
    }
}

impl From<SizeHint> for PayloadSize {
    fn from(size_hint: SizeHint) -> Self {
        match size_hint.exact() {
            Some(length) => PayloadSize::new_length(length),
            None => PayloadSize::Chunked,
        }
    }
}

impl From<PayloadSize> for SizeHint {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(length) => SizeHint::with_exact(length),
            PayloadSize::Chunked => SizeHint::new(),
            PayloadSize::Empty => SizeHint::with_exact(0),
        }
    }
}
