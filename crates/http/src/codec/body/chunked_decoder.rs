//! Decoding of chunked transfer coded request bodies.
//!
//! Each chunk is a hexadecimal size line, optionally followed by `;`
//! extensions which are ignored, then that many data bytes and a CRLF. A zero
//! size chunk ends the body; any trailer fields after it are skipped up to the
//! closing empty line. Data is handed out as soon as it arrives, in segments of
//! at most `max_segment` bytes.

use std::cmp;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadItem};

/// Longest size line (or trailer line) accepted before the body is rejected.
const MAX_LINE_BYTES: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    SizeLine,
    Data,
    DataCrlf,
    Trailer,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining: u64,
    max_segment: usize,
}

impl ChunkedDecoder {
    pub fn new(max_segment: usize) -> Self {
        Self { state: ChunkedState::SizeLine, remaining: 0, max_segment: max_segment.max(1) }
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                ChunkedState::SizeLine => {
                    let Some(line_len) = take_line(src)? else {
                        return Ok(None);
                    };
                    let size = parse_chunk_size(&src[..line_len])?;
                    src.advance(line_len + 2);
                    trace!(size, "read chunk size");

                    if size == 0 {
                        self.state = ChunkedState::Trailer;
                    } else {
                        self.remaining = size;
                        self.state = ChunkedState::Data;
                    }
                }

                ChunkedState::Data => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let len = cmp::min(self.remaining, cmp::min(src.len(), self.max_segment) as u64);
                    #[allow(clippy::cast_possible_truncation, reason = "len never exceeds src.len()")]
                    let bytes = src.split_to(len as usize).freeze();
                    self.remaining -= len;
                    if self.remaining == 0 {
                        self.state = ChunkedState::DataCrlf;
                    }
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                ChunkedState::DataCrlf => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    ensure!(&src[..2] == b"\r\n", ParseError::invalid_body("chunk data is not followed by CRLF"));
                    src.advance(2);
                    self.state = ChunkedState::SizeLine;
                }

                ChunkedState::Trailer => {
                    let Some(line_len) = take_line(src)? else {
                        return Ok(None);
                    };
                    src.advance(line_len + 2);
                    if line_len == 0 {
                        self.state = ChunkedState::Done;
                    }
                }

                ChunkedState::Done => return Ok(Some(PayloadItem::Eof)),
            }
        }
    }
}

/// Length of the next CRLF terminated line, without the terminator.
fn take_line(src: &BytesMut) -> Result<Option<usize>, ParseError> {
    match src.windows(2).position(|window| window == b"\r\n") {
        Some(line_len) => {
            ensure!(line_len <= MAX_LINE_BYTES, ParseError::invalid_body("chunk size line too long"));
            Ok(Some(line_len))
        }
        None => {
            ensure!(src.len() <= MAX_LINE_BYTES, ParseError::invalid_body("chunk size line too long"));
            Ok(None)
        }
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, ParseError> {
    let size = match line.iter().position(|b| *b == b';') {
        Some(extension_start) => &line[..extension_start],
        None => line,
    };
    let size = size.trim_ascii();

    ensure!(
        !size.is_empty() && size.iter().all(u8::is_ascii_hexdigit),
        ParseError::invalid_body(format!("invalid chunk size line {:?}", String::from_utf8_lossy(line)))
    );

    size.iter().try_fold(0_u64, |acc, digit| {
        let value = u64::from(hex_value(*digit));
        acc.checked_mul(16)
            .and_then(|acc| acc.checked_add(value))
            .ok_or_else(|| ParseError::invalid_body("chunk size overflows u64"))
    })
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}
