//! Response heads as they travel from the handler to the encoder.

use std::borrow::Cow;

use http::{HeaderMap, Response, StatusCode};

use crate::protocol::request::has_close_token;

/// The head of a response, before a body is attached.
pub type ResponseHead = Response<()>;

/// A custom reason phrase for the status line.
///
/// Put it in the response extensions to override the canonical phrase. Codes
/// without a canonical phrase are written with an empty one otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonPhrase(Cow<'static, str>);

impl ReasonPhrase {
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self(reason.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Picks the reason phrase written after `status` on the status line.
pub(crate) fn reason_phrase<'a>(status: StatusCode, custom: Option<&'a ReasonPhrase>) -> &'a str {
    match custom {
        Some(reason) => reason.as_str(),
        None => status.canonical_reason().unwrap_or(""),
    }
}

/// True when the handler asked for the connection to be closed after this response.
pub(crate) fn response_wants_close(headers: &HeaderMap) -> bool {
    has_close_token(headers)
}
