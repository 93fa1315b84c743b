use std::cmp;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

/// Decodes a body framed by `Content-Length`, handing it out in segments of at
/// most `max_segment` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    length: u64,
    max_segment: usize,
}

impl LengthDecoder {
    pub fn new(length: u64, max_segment: usize) -> Self {
        Self { length, max_segment: max_segment.max(1) }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = cmp::min(self.length, cmp::min(src.len(), self.max_segment) as u64);
        #[allow(clippy::cast_possible_truncation, reason = "len never exceeds src.len()")]
        let bytes = src.split_to(len as usize).freeze();

        self.length -= len;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let mut buffer = BytesMut::from(&b"101234567890abcdef\r\n\r\n"[..]);

        let mut length_decoder = LengthDecoder::new(10, 4096);
        let payload = length_decoder.decode(&mut buffer).unwrap().unwrap();

        assert_eq!(&payload.into_bytes().unwrap()[..], b"1012345678");
        assert_eq!(&buffer[..], b"90abcdef\r\n\r\n");
        assert!(length_decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn segments_are_bounded() {
        let mut buffer = BytesMut::from(&b"abcdefg"[..]);
        let mut length_decoder = LengthDecoder::new(7, 3);

        assert_eq!(&length_decoder.decode(&mut buffer).unwrap().unwrap().into_bytes().unwrap()[..], b"abc");
        assert_eq!(&length_decoder.decode(&mut buffer).unwrap().unwrap().into_bytes().unwrap()[..], b"def");
        assert_eq!(&length_decoder.decode(&mut buffer).unwrap().unwrap().into_bytes().unwrap()[..], b"g");
        assert!(length_decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn waits_for_more_bytes() {
        let mut buffer = BytesMut::new();
        let mut length_decoder = LengthDecoder::new(2, 3);
        assert!(length_decoder.decode(&mut buffer).unwrap().is_none());
    }
}
