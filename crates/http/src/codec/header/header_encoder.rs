//! Serialisation of response heads.
//!
//! The status line is always written as `HTTP/1.1`. The framing headers are
//! rewritten to agree with the [`PayloadSize`] the connection settled on, so a
//! response never goes out with both `Content-Length` and chunked coding.

use std::io::{self, Write};

use bytes::{BufMut, BytesMut};
use http::{HeaderValue, header};
use tokio_util::codec::Encoder;

use crate::codec::header::header_decoder::is_chunked;
use crate::protocol::{PayloadSize, ReasonPhrase, ResponseHead, SendError, reason_phrase};

const INIT_HEADER_SIZE: usize = 4 * 1024;

#[derive(Debug, Default)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        let status = head.status();
        let reason = reason_phrase(status, head.extensions().get::<ReasonPhrase>());
        write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", status.as_str(), reason)?;

        let headers = head.headers_mut();
        match payload_size {
            PayloadSize::Length(n) => {
                headers.insert(header::CONTENT_LENGTH, n.into());
                if headers.get(header::TRANSFER_ENCODING).is_some_and(is_chunked) {
                    headers.remove(header::TRANSFER_ENCODING);
                }
            }
            PayloadSize::Chunked => {
                headers.remove(header::CONTENT_LENGTH);
                headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
            PayloadSize::Empty => {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
                if headers.get(header::TRANSFER_ENCODING).is_some_and(is_chunked) {
                    headers.remove(header::TRANSFER_ENCODING);
                }
            }
        }

        for (name, value) in head.headers() {
            dst.put_slice(name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

pub(crate) struct FastWrite<'a>(pub(crate) &'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use http::{Response, StatusCode};
    use indoc::indoc;

    use super::*;

    fn encode(head: ResponseHead, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn writes_status_line_and_length() {
        let head = Response::builder().status(StatusCode::OK).header("X-Id", "7").body(()).unwrap();
        let expected = indoc! {"
            HTTP/1.1 200 OK\r
            x-id: 7\r
            content-length: 12\r
            \r
        "};
        assert_eq!(encode(head, PayloadSize::Length(12)), expected);
    }

    #[test]
    fn chunked_replaces_content_length() {
        let head = Response::builder()
            .status(StatusCode::ACCEPTED)
            .header(header::CONTENT_LENGTH, "99")
            .body(())
            .unwrap();
        let encoded = encode(head, PayloadSize::Chunked);
        assert!(encoded.starts_with("HTTP/1.1 202 Accepted\r\n"));
        assert!(encoded.contains("transfer-encoding: chunked\r\n"));
        assert!(!encoded.contains("content-length"));
    }

    #[test]
    fn custom_and_missing_reason() {
        let mut head = Response::builder().status(StatusCode::OK).body(()).unwrap();
        head.extensions_mut().insert(ReasonPhrase::new("Fine"));
        assert!(encode(head, PayloadSize::Empty).starts_with("HTTP/1.1 200 Fine\r\ncontent-length: 0\r\n"));

        let head = Response::builder().status(599).body(()).unwrap();
        assert!(encode(head, PayloadSize::Empty).starts_with("HTTP/1.1 599 \r\n"));
    }
}
