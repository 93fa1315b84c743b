use std::io;

use thiserror::Error;

/// Why a connection stopped serving requests.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to read request: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("failed to write response: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

/// Failures while reading a request head or body off the wire.
///
/// Every variant except [`ParseError::Io`] means the peer sent something
/// malformed and is answered with `400 Bad Request`.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("request head is {size} bytes, limit is {limit}")]
    TooLargeHeader { size: usize, limit: usize },

    #[error("request has more than {limit} headers")]
    TooManyHeaders { limit: usize },

    #[error("forbidden byte 0x{byte:02x} at offset {position} of request head")]
    InvalidByte { byte: u8, position: usize },

    #[error("malformed header: {reason}")]
    InvalidHeader { reason: String },

    #[error("unsupported http version 1.{0:?}")]
    InvalidVersion(Option<u8>),

    #[error("malformed request method")]
    InvalidMethod,

    #[error("invalid request target: {reason}")]
    InvalidUri { reason: String },

    #[error("bad content-length: {reason}")]
    InvalidContentLength { reason: String },

    #[error("malformed request body: {reason}")]
    InvalidBody { reason: String },

    #[error("transport failed: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(size: usize, limit: usize) -> Self {
        Self::TooLargeHeader { size, limit }
    }

    pub fn too_many_headers(limit: usize) -> Self {
        Self::TooManyHeaders { limit }
    }

    pub fn invalid_byte(byte: u8, position: usize) -> Self {
        Self::InvalidByte { byte, position }
    }

    pub fn invalid_header(reason: impl ToString) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    pub fn invalid_uri(reason: impl ToString) -> Self {
        Self::InvalidUri { reason: reason.to_string() }
    }

    pub fn invalid_body(reason: impl ToString) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    pub fn invalid_content_length(reason: impl ToString) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }

    pub fn io(e: impl Into<io::Error>) -> Self {
        Self::Io { source: e.into() }
    }

    /// True when the peer broke the protocol, false when the transport failed.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }

    /// Text safe to echo back to the client in a `400` body.
    pub(crate) fn client_detail(&self) -> Option<String> {
        match self {
            Self::InvalidUri { reason } => Some(reason.clone()),
            _ => None,
        }
    }
}

/// Failures while writing a response.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("response body failed: {reason}")]
    InvalidBody { reason: String },

    #[error("response declared {expected} body bytes but ended after {written}")]
    StreamClosedEarly { expected: u64, written: u64 },

    #[error("transport failed: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body(reason: impl ToString) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    pub fn stream_closed_early(expected: u64, written: u64) -> Self {
        Self::StreamClosedEarly { expected, written }
    }

    pub fn io(e: impl Into<io::Error>) -> Self {
        Self::Io { source: e.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_are_not_malformed() {
        assert!(ParseError::invalid_byte(0, 3).is_malformed());
        assert!(ParseError::InvalidMethod.is_malformed());
        assert!(!ParseError::io(io::Error::from(io::ErrorKind::BrokenPipe)).is_malformed());
    }

    #[test]
    fn only_target_errors_reach_the_client() {
        assert_eq!(ParseError::invalid_uri("bad escape").client_detail().as_deref(), Some("bad escape"));
        assert_eq!(ParseError::too_many_headers(4).client_detail(), None);
    }
}
