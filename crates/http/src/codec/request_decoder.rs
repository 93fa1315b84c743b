use std::io;

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::debug;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::connection::ConnectionConfig;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

/// Decodes a stream of requests: a head, then the body segments of that
/// request, then the next head.
#[derive(Debug)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
    max_segment: usize,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &ConnectionConfig) -> Self {
        Self {
            header_decoder: HeaderDecoder::new(config.max_header_bytes(), config.max_headers()),
            payload_decoder: None,
            max_segment: config.read_chunk_size(),
        }
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::with_config(&ConnectionConfig::default())
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                self.payload_decoder = Some(PayloadDecoder::new(payload_size, self.max_segment));
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(message) = self.decode(buf)? {
            return Ok(Some(message));
        }

        if self.payload_decoder.is_some() {
            return Err(ParseError::io(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed inside a request body")));
        }

        if !buf.is_empty() {
            debug!(pending = buf.len(), "peer closed with a partial request head");
            buf.clear();
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::Method;

    use super::*;

    #[test]
    fn head_then_body_then_next_head() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from(
            &b"POST /a HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET /b HTTP/1.1\r\n\r\n"[..],
        );

        let Some(Message::Header((header, payload_size))) = decoder.decode(&mut buf).unwrap() else {
            panic!("expected a head");
        };
        assert_eq!(header.method(), &Method::POST);
        assert_eq!(payload_size, PayloadSize::Length(3));

        let item = decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap();
        assert_eq!(item, PayloadItem::Chunk(Bytes::from_static(b"abc")));
        let item = decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap();
        assert!(item.is_eof());

        let Some(Message::Header((header, payload_size))) = decoder.decode(&mut buf).unwrap() else {
            panic!("expected a second head");
        };
        assert_eq!(header.uri().path(), "/b");
        assert_eq!(payload_size, PayloadSize::Empty);
        assert!(decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap().is_eof());
    }

    #[test]
    fn eof_inside_body_is_an_error() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from(&b"POST /a HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc"[..]);

        assert!(decoder.decode(&mut buf).unwrap().unwrap().is_header());
        assert!(decoder.decode(&mut buf).unwrap().unwrap().is_payload());
        assert!(matches!(decoder.decode_eof(&mut buf), Err(ParseError::Io { .. })));
    }

    #[test]
    fn eof_inside_head_ends_quietly() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from(&b"GET /a HTT"[..]);
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }
}
