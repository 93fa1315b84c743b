use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;
use tracing::warn;

use crate::protocol::{PayloadItem, SendError};

/// Writes a body announced with `Content-Length`.
///
/// Bytes beyond the announced length are dropped. Ending the body before the
/// announced length is an error, the peer could not tell the body apart from
/// whatever followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    length: u64,
    written: u64,
    finished: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { length, written: 0, finished: false }
    }

    pub fn is_finish(&self) -> bool {
        self.finished
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                let remaining = self.length - self.written;
                let len = bytes.remaining() as u64;
                if len > remaining {
                    warn!(declared = self.length, surplus = len - remaining, "response body longer than its content-length, truncating");
                }

                let take = len.min(remaining);
                #[allow(clippy::cast_possible_truncation, reason = "take never exceeds bytes.remaining()")]
                let take_len = take as usize;
                dst.put((&mut bytes).take(take_len));
                self.written += take;
                Ok(())
            }
            PayloadItem::Eof => {
                self.finished = true;
                if self.written < self.length {
                    return Err(SendError::stream_closed_early(self.length, self.written));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn writes_exactly_the_declared_length() {
        let mut encoder = LengthEncoder::new(5);
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hel")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"lo, world")), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();

        assert_eq!(&dst[..], b"hello");
        assert!(encoder.is_finish());
    }

    #[test]
    fn early_end_is_an_error() {
        let mut encoder = LengthEncoder::new(10);
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"abc")), &mut dst).unwrap();
        let result = encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst);
        assert!(matches!(result, Err(SendError::StreamClosedEarly { expected: 10, written: 3 })));
    }
}
