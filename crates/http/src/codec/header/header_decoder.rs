//! Decoding of request heads.
//!
//! The decoder first locates the end of the head with a [`HeaderScanner`],
//! which also enforces the byte rules for heads. Only a complete head is then
//! handed to `httparse`, which validates the request line and header syntax.
//!
//! On top of what `httparse` checks, the decoder
//!
//! - canonicalises well-known methods written in any case (`get` becomes `GET`),
//! - validates the request target and its percent-encoding,
//! - merges repeated headers into one comma separated value, except
//!   `Content-Length` where the last occurrence wins,
//! - works out how the body is framed.

use bytes::{Bytes, BytesMut};
use http::header::{self, Entry};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::header::scanner::{HeaderScanner, ScanOutcome};
use crate::ensure;
use crate::protocol::path::decode_path;
use crate::protocol::{ParseError, PayloadSize, RequestHeader};

pub(crate) const DEFAULT_MAX_HEADER_NUM: usize = 64;

pub(crate) const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

#[derive(Debug)]
pub struct HeaderDecoder {
    scanner: HeaderScanner,
    max_header_bytes: usize,
    max_headers: usize,
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEADER_BYTES, DEFAULT_MAX_HEADER_NUM)
    }
}

impl HeaderDecoder {
    pub fn new(max_header_bytes: usize, max_headers: usize) -> Self {
        Self { scanner: HeaderScanner::new(), max_header_bytes, max_headers }
    }
}

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.scanner.scan(src) {
            ScanOutcome::Incomplete => {
                ensure!(src.len() <= self.max_header_bytes, ParseError::too_large_header(src.len(), self.max_header_bytes));
                Ok(None)
            }
            ScanOutcome::Forbidden { byte, position } => Err(ParseError::invalid_byte(byte, position)),
            ScanOutcome::Complete(head_len) => {
                trace!(head_len, "found end of request head");
                ensure!(head_len <= self.max_header_bytes, ParseError::too_large_header(head_len, self.max_header_bytes));

                let head = src.split_to(head_len).freeze();
                let header = parse_head(&head, self.max_headers)?;
                let payload_size = parse_payload(header.headers())?;
                Ok(Some((header, payload_size)))
            }
        }
    }
}

fn parse_head(head: &Bytes, max_headers: usize) -> Result<RequestHeader, ParseError> {
    let mut headers = vec![httparse::EMPTY_HEADER; max_headers];
    let mut req = httparse::Request::new(&mut headers);

    match req.parse(head).map_err(|e| match e {
        Error::TooManyHeaders => ParseError::too_many_headers(max_headers),
        Error::Version => ParseError::InvalidVersion(None),
        e => ParseError::invalid_header(e.to_string()),
    })? {
        Status::Complete(_) => {}
        Status::Partial => return Err(ParseError::invalid_header("request head ended unexpectedly")),
    }

    let version = match req.version {
        Some(0) => Version::HTTP_10,
        Some(1) => Version::HTTP_11,
        other => return Err(ParseError::InvalidVersion(other)),
    };
    let method = parse_method(req.method.ok_or(ParseError::InvalidMethod)?)?;
    let uri = parse_target(req.path.ok_or_else(|| ParseError::invalid_uri("missing request target"))?)?;

    let mut builder = Request::builder().method(method).uri(uri).version(version);
    if let Some(map) = builder.headers_mut() {
        merge_headers(map, req.headers)?;
    }
    let request = builder.body(()).map_err(ParseError::invalid_header)?;
    Ok(RequestHeader::from(request))
}

/// Maps the well-known methods case-insensitively to their canonical form,
/// anything else must be a valid token and is kept verbatim.
fn parse_method(raw: &str) -> Result<Method, ParseError> {
    const KNOWN: [Method; 8] = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::HEAD,
        Method::TRACE,
        Method::CONNECT,
        Method::OPTIONS,
    ];

    if let Some(known) = KNOWN.iter().find(|method| method.as_str().eq_ignore_ascii_case(raw)) {
        return Ok(known.clone());
    }
    Method::from_bytes(raw.as_bytes()).map_err(|_e| ParseError::InvalidMethod)
}

fn parse_target(raw: &str) -> Result<Uri, ParseError> {
    let uri = raw.parse::<Uri>().map_err(ParseError::invalid_uri)?;
    decode_path(uri.path())?;
    Ok(uri)
}

fn merge_headers(map: &mut HeaderMap, parsed: &[httparse::Header<'_>]) -> Result<(), ParseError> {
    map.reserve(parsed.len());
    for parsed_header in parsed {
        let name = HeaderName::from_bytes(parsed_header.name.as_bytes()).map_err(ParseError::invalid_header)?;
        let value = parsed_header.value.trim_ascii();

        match map.entry(name) {
            Entry::Vacant(entry) => {
                entry.insert(HeaderValue::from_bytes(value).map_err(ParseError::invalid_header)?);
            }
            Entry::Occupied(mut entry) if *entry.key() == header::CONTENT_LENGTH => {
                entry.insert(HeaderValue::from_bytes(value).map_err(ParseError::invalid_header)?);
            }
            Entry::Occupied(mut entry) => {
                let existing = entry.get().as_bytes();
                let mut joined = Vec::with_capacity(existing.len() + 2 + value.len());
                joined.extend_from_slice(existing);
                joined.extend_from_slice(b", ");
                joined.extend_from_slice(value);
                entry.insert(HeaderValue::from_bytes(&joined).map_err(ParseError::invalid_header)?);
            }
        }
    }
    Ok(())
}

/// Works out the body framing of a request.
///
/// Chunked transfer coding takes precedence over `Content-Length`; a request
/// with neither has no body.
fn parse_payload(headers: &HeaderMap) -> Result<PayloadSize, ParseError> {
    if headers.get(header::TRANSFER_ENCODING).is_some_and(is_chunked) {
        return Ok(PayloadSize::Chunked);
    }

    match headers.get(header::CONTENT_LENGTH) {
        None => Ok(PayloadSize::Empty),
        Some(cl_value) => {
            let cl_str = cl_value.to_str().map_err(|_e| ParseError::invalid_content_length("value is not visible ascii"))?;
            let length = cl_str
                .trim()
                .parse::<u64>()
                .map_err(|_e| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;
            Ok(PayloadSize::new_length(length))
        }
    }
}

/// True when the final transfer coding is `chunked`.
pub(crate) fn is_chunked(value: &HeaderValue) -> bool {
    value
        .as_bytes()
        .rsplit(|b| *b == b',')
        .next()
        .is_some_and(|coding| coding.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}
