use bytes::{Buf, Bytes};

/// A frame flowing through the request decoder or the response encoder.
///
/// A message starts with exactly one `Header` followed by zero or more
/// `Payload` items, the last of which is always [`PayloadItem::Eof`] when the
/// message carries a body.
pub enum Message<T, Data: Buf = Bytes> {
    /// The head of the message: request line and headers, or status line and headers
    Header(T),
    /// A segment of the message body, or the end marker
    Payload(PayloadItem<Data>),
}

/// One step of a streamed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// A segment of body bytes
    Chunk(Data),
    /// No more body bytes will follow
    Eof,
}

/// How the body of a message is delimited on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// Exactly `n` bytes follow the head (`Content-Length`)
    Length(u64),
    /// The body uses chunked transfer coding
    Chunked,
    /// The message has no body
    Empty,
}

impl PayloadSize {
    /// Builds a fixed-length size, folding a zero length into [`PayloadSize::Empty`].
    #[inline]
    pub fn new_length(length: u64) -> Self {
        if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) }
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

impl<T, D: Buf> Message<T, D> {
    #[inline]
    pub fn is_payload(&self) -> bool {
        matches!(self, Message::Payload(_))
    }

    #[inline]
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    /// Returns the payload item, or `None` when this message is a head.
    pub fn into_payload_item(self) -> Option<PayloadItem<D>> {
        match self {
            Message::Header(_) => None,
            Message::Payload(payload_item) => Some(payload_item),
        }
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }
}

impl PayloadItem {
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}
